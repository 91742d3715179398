//! Tripwire Engine - Metric alarm reconciliation
//!
//! Keeps the alarms owned by one name prefix in step with the resources a
//! configuration selects. A pass discovers resources, synthesizes the
//! desired alarms, reads the owned alarms, diffs the two by name, and
//! applies the difference with pacing and throttling retries.
//!
//! ## Components
//!
//! - **ResourceResolver**: Lists and filters resources per configured rule
//! - **AlarmSpecBuilder**: One alarm spec per resource and metric
//! - **ExistingAlarmFetcher**: Reads every alarm carrying the prefix
//! - **Reconciler**: Pure name-based diff into create/delete lists
//! - **Applier**: Executes a plan through the [`Pacer`] and [`RetryPolicy`]
//! - **ReconciliationPass**: Orchestrates one pass and reports on it
//!
//! The cloud is reached only through the [`InventoryApi`] and [`AlarmApi`]
//! ports. [`InMemoryCloud`] implements both.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod applier;
pub mod builder;
pub mod cloud;
pub mod error;
pub mod fetcher;
pub mod pacer;
pub mod paginate;
pub mod pass;
pub mod reconciler;
pub mod resolver;
pub mod retry;

pub use applier::{Applier, ApplyAction, ApplyFailure, ApplyReport};
pub use builder::{alarm_name, AlarmSpecBuilder};
pub use cloud::{
    AlarmApi, ApiCall, ApiCallKind, BatchItemError, CloudState, InMemoryCloud, InventoryApi, Page,
    MAX_DELETE_BATCH,
};
pub use error::{CloudError, CloudResult, EngineError, Result};
pub use fetcher::ExistingAlarmFetcher;
pub use pacer::Pacer;
pub use paginate::{paginate, Paginator};
pub use pass::{PassOptions, PassReport, ReconciliationPass};
pub use reconciler::{diff, PlanSummary, ReconcilePlan};
pub use resolver::{Discovery, DiscoveryFailure, ResourceResolver, ResourceTarget};
pub use retry::RetryPolicy;
