//! Cloud API ports
//!
//! The engine talks to the provider only through these traits. Each list
//! call returns one [`Page`]; callers walk pages with
//! [`crate::paginate::paginate`].

mod memory;

pub use memory::{ApiCall, ApiCallKind, CloudState, InMemoryCloud};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tripwire_types::{AlarmSpec, ExistingAlarm, ResourceDescriptor, ResourceType};

use crate::error::{CloudError, CloudResult};

/// Largest number of names a single delete call accepts
pub const MAX_DELETE_BATCH: usize = 100;

/// One page of a list response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// Continuation token; `None` or empty when this is the last page
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    pub fn with_next(items: Vec<T>, next_token: impl Into<String>) -> Self {
        Self {
            items,
            next_token: Some(next_token.into()),
        }
    }
}

/// Per-name failure inside a batch delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemError {
    pub name: String,
    pub error: CloudError,
}

/// Resource inventory
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// List one page of resources of a type
    ///
    /// `tag_filter` is a server-side hint; implementations may ignore it.
    async fn list_resources(
        &self,
        resource_type: ResourceType,
        tag_filter: &BTreeMap<String, String>,
        page_token: Option<String>,
    ) -> CloudResult<Page<ResourceDescriptor>>;
}

/// Metric alarm API
#[async_trait]
pub trait AlarmApi: Send + Sync {
    /// List one page of metric alarms whose name starts with `name_prefix`
    async fn describe_alarms(
        &self,
        name_prefix: &str,
        page_token: Option<String>,
    ) -> CloudResult<Page<ExistingAlarm>>;

    /// Create or replace one alarm
    async fn put_metric_alarm(&self, spec: &AlarmSpec) -> CloudResult<()>;

    /// Delete up to [`MAX_DELETE_BATCH`] alarms; returns the names that failed
    async fn delete_alarms(&self, names: &[String]) -> CloudResult<Vec<BatchItemError>>;
}
