//! Tripwire Types - Core types for metric alarm reconciliation
//!
//! Tripwire keeps a set of metric alarms in step with a changing fleet of
//! cloud resources. This crate holds the plain data model shared by the
//! engine and the command-line front end.
//!
//! ## Key Concepts
//!
//! - **ConfigModel**: Validated declarative configuration (globals + per-type rules)
//! - **ResourceFilter**: Name pattern and tag set selecting resources
//! - **ResourceType**: Supported resource kinds and their lookup table
//! - **TargetResource**: A resource matched by a filter during one pass
//! - **AlarmParams**: Alarm parameters, layered from defaults and overrides
//! - **AlarmSpec**: One alarm that should exist
//! - **ExistingAlarm**: One owned alarm that currently exists

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod alarm;
pub mod config;
pub mod error;
pub mod filter;
pub mod params;
pub mod resource;

// Re-export main types
pub use alarm::{AlarmSpec, Dimension, ExistingAlarm, MAX_ALARM_NAME_LEN, OWNERSHIP_TAG_KEY};
pub use config::{
    ConfigModel, GlobalAlarmConfig, GlobalConfig, ResourceAlarmConfig, ResourceConfig,
    DEFAULT_API_CALL_INTERVAL_MILLIS,
};
pub use error::ConfigError;
pub use filter::{CompiledFilter, ResourceFilter};
pub use params::{AlarmParams, ComparisonOperator, PartialAlarmParams, Statistic, TreatMissingData};
pub use resource::{
    DimensionSource, NameSource, ResourceDescriptor, ResourceType, ResourceTypeInfo,
    TargetResource, RESOURCE_TYPE_TABLE,
};
