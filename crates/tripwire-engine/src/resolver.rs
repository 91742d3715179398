//! Resource discovery
//!
//! Each configured resource rule is resolved on its own: list every
//! resource of the rule's type, then keep those accepted by the rule's
//! merged filter. Rules run concurrently and never see each other's
//! results.

use futures::future::join_all;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};
use tripwire_types::{
    CompiledFilter, ConfigError, ConfigModel, ResourceConfig, ResourceDescriptor, ResourceType,
    TargetResource,
};

use crate::cloud::InventoryApi;
use crate::error::{CloudError, CloudResult};
use crate::paginate::paginate;

/// A resource rule with its type parsed and its filter compiled
#[derive(Debug, Clone)]
pub struct ResourceTarget {
    pub key: String,
    pub resource_type: ResourceType,
    pub filter: CompiledFilter,
    pub config: ResourceConfig,
}

impl ResourceTarget {
    /// Prepare every rule of a configuration, in key order
    pub fn from_config(config: &ConfigModel) -> Result<Vec<Self>, ConfigError> {
        let global = config.globals.filter();

        config
            .resources
            .iter()
            .map(|(key, resource)| {
                Ok(Self {
                    key: key.clone(),
                    resource_type: resource.resource_type(key)?,
                    filter: global
                        .merged_with(&resource.filter())
                        .compile(&format!("resources.{}", key))?,
                    config: resource.clone(),
                })
            })
            .collect()
    }
}

/// A rule whose listing failed during this pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryFailure {
    pub key: String,
    pub resource_type: ResourceType,
    pub cause: CloudError,
}

/// Outcome of resolving every rule
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Matched resources per rule key; failed rules are absent
    pub resources: BTreeMap<String, BTreeSet<TargetResource>>,
    pub failures: Vec<DiscoveryFailure>,
}

impl Discovery {
    /// Resource types with at least one failed listing
    pub fn failed_types(&self) -> BTreeSet<ResourceType> {
        self.failures.iter().map(|f| f.resource_type).collect()
    }

    /// Alarm name prefixes that must not be deleted this pass
    pub fn protected_prefixes(&self, prefix: &str) -> Vec<String> {
        self.failed_types()
            .into_iter()
            .map(|t| format!("{}{}-", prefix, t.token()))
            .collect()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.values().map(BTreeSet::len).sum()
    }
}

/// Lists resources through the inventory port and filters them
pub struct ResourceResolver {
    inventory: Arc<dyn InventoryApi>,
}

impl ResourceResolver {
    pub fn new(inventory: Arc<dyn InventoryApi>) -> Self {
        Self { inventory }
    }

    /// All resources of `resource_type` accepted by `filter`
    pub async fn resolve(
        &self,
        resource_type: ResourceType,
        filter: &CompiledFilter,
    ) -> CloudResult<BTreeSet<TargetResource>> {
        let inventory = &self.inventory;
        let descriptors: Vec<ResourceDescriptor> = paginate(|token| {
            inventory.list_resources(resource_type, filter.tags(), token)
        })
        .try_concat()
        .await?;

        let listed = descriptors.len();
        let matched: BTreeSet<TargetResource> = descriptors
            .into_iter()
            .filter(|d| d.resource_type == resource_type)
            .map(TargetResource::from_descriptor)
            .filter(|target| filter.matches(target))
            .collect();

        debug!(
            resource_type = %resource_type,
            listed,
            matched = matched.len(),
            "Resolved resources"
        );

        Ok(matched)
    }

    /// Resolve every rule concurrently
    ///
    /// A listing failure is recorded against its rule and does not affect
    /// the others.
    pub async fn resolve_all(&self, targets: &[ResourceTarget]) -> Discovery {
        let results = join_all(targets.iter().map(|target| async move {
            (target, self.resolve(target.resource_type, &target.filter).await)
        }))
        .await;

        let mut discovery = Discovery::default();
        for (target, result) in results {
            match result {
                Ok(resources) => {
                    discovery.resources.insert(target.key.clone(), resources);
                }
                Err(cause) => {
                    warn!(
                        key = %target.key,
                        resource_type = %target.resource_type,
                        error = %cause,
                        "Resource discovery failed; skipping rule for this pass"
                    );
                    discovery.failures.push(DiscoveryFailure {
                        key: target.key.clone(),
                        resource_type: target.resource_type,
                        cause,
                    });
                }
            }
        }

        discovery
    }
}
