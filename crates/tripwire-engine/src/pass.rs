//! One reconciliation pass
//!
//! validate → resolve → build → fetch → diff → apply. A pass holds no state
//! between runs; the alarm API is the only record of what exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, info_span, Instrument};
use tripwire_types::ConfigModel;
use uuid::Uuid;

use crate::applier::{Applier, ApplyReport};
use crate::builder::AlarmSpecBuilder;
use crate::cloud::{AlarmApi, InventoryApi};
use crate::error::{EngineError, Result};
use crate::fetcher::ExistingAlarmFetcher;
use crate::pacer::Pacer;
use crate::reconciler::{diff, PlanSummary};
use crate::resolver::{DiscoveryFailure, ResourceResolver, ResourceTarget};
use crate::retry::RetryPolicy;

/// Caller-controlled knobs for a pass
#[derive(Debug, Clone)]
pub struct PassOptions {
    /// Compute the plan without calling put or delete
    pub dry_run: bool,
    /// Appended to the configured alarm actions
    pub additional_actions: Vec<String>,
    /// Wall-clock budget for the whole pass
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            additional_actions: Vec::new(),
            timeout: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Everything a pass decided and did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub run_id: Uuid,
    pub prefix: String,
    pub dry_run: bool,
    pub resources_matched: usize,
    pub plan: PlanSummary,
    pub to_create: Vec<String>,
    pub to_delete: Vec<String>,
    pub discovery_failures: Vec<DiscoveryFailure>,
    /// Deletions held back because their resource type failed discovery
    pub protected: Vec<String>,
    /// `None` for dry runs
    pub apply: Option<ApplyReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PassReport {
    /// No discovery failures and no failed items
    pub fn is_clean(&self) -> bool {
        self.discovery_failures.is_empty()
            && self.apply.as_ref().map_or(true, ApplyReport::is_clean)
    }
}

/// Runs reconciliation passes against a pair of cloud ports
pub struct ReconciliationPass {
    inventory: Arc<dyn InventoryApi>,
    alarms: Arc<dyn AlarmApi>,
    options: PassOptions,
}

impl ReconciliationPass {
    pub fn new(inventory: Arc<dyn InventoryApi>, alarms: Arc<dyn AlarmApi>) -> Self {
        Self {
            inventory,
            alarms,
            options: PassOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PassOptions) -> Self {
        self.options = options;
        self
    }

    /// Run one pass for `config`
    ///
    /// Configuration errors, a failed alarm fetch and a passed deadline are
    /// errors. Discovery and per-item apply failures are reported in the
    /// returned [`PassReport`].
    pub async fn run(&self, config: &ConfigModel) -> Result<PassReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "reconcile",
            run_id = %run_id,
            prefix = %config.globals.prefix(),
            dry_run = self.options.dry_run
        );

        self.run_inner(run_id, config).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, config: &ConfigModel) -> Result<PassReport> {
        let started_at = Utc::now();
        let deadline = self.options.timeout.map(|t| Instant::now() + t);

        config.validate()?;
        let prefix = config.globals.prefix();
        let rules = ResourceTarget::from_config(config)?;

        let resolver = ResourceResolver::new(Arc::clone(&self.inventory));
        let discovery = within(deadline, "discovery", resolver.resolve_all(&rules)).await?;

        let builder = AlarmSpecBuilder::new(&config.globals, &self.options.additional_actions);
        let desired = builder.build_desired(&rules, &discovery);

        let fetcher = ExistingAlarmFetcher::new(Arc::clone(&self.alarms));
        let existing = within(deadline, "fetch", fetcher.fetch_owned(prefix))
            .await?
            .map_err(|source| {
                error!(error = %source, "Failed to fetch existing alarms; nothing will be applied");
                EngineError::FetchExisting {
                    prefix: prefix.to_string(),
                    source,
                }
            })?;

        let mut plan = diff(&desired, existing.values(), prefix);
        let protected = plan.protect(&discovery.protected_prefixes(prefix));

        info!(
            resources = discovery.resource_count(),
            desired = desired.len(),
            existing = existing.len(),
            create = plan.to_create.len(),
            delete = plan.to_delete.len(),
            protected = protected.len(),
            "Plan computed"
        );

        let apply = if self.options.dry_run {
            None
        } else {
            let mut applier = Applier::new(
                Arc::clone(&self.alarms),
                Pacer::from_millis(config.globals.api_call_intervals_in_millis),
            )
            .with_retry(self.options.retry)
            .with_deadline(deadline);

            Some(applier.apply(&plan.to_create, &plan.to_delete).await?)
        };

        Ok(PassReport {
            run_id,
            prefix: prefix.to_string(),
            dry_run: self.options.dry_run,
            resources_matched: discovery.resource_count(),
            plan: plan.summary(),
            to_create: plan.create_names(),
            to_delete: plan.to_delete,
            discovery_failures: discovery.failures,
            protected,
            apply,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

async fn within<F: Future>(deadline: Option<Instant>, phase: &'static str, fut: F) -> Result<F::Output> {
    match deadline {
        Some(deadline) => timeout_at(deadline, fut)
            .await
            .map_err(|_| EngineError::deadline(phase)),
        None => Ok(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::InMemoryCloud;
    use serde_json::json;
    use tripwire_types::{ResourceDescriptor, ResourceType};

    fn config() -> ConfigModel {
        serde_json::from_value(json!({
            "globals": {
                "api_call_intervals_in_millis": 0,
                "alarm": { "alarm_name_prefix": "tw-" }
            },
            "resources": {
                "fns": {
                    "target_resource_type": "lambda:function",
                    "alarm": { "metrics": ["Errors"] }
                }
            }
        }))
        .unwrap()
    }

    async fn cloud_with_function() -> Arc<InMemoryCloud> {
        let cloud = Arc::new(InMemoryCloud::new());
        cloud
            .add_resource(ResourceDescriptor::new(
                ResourceType::LambdaFunction,
                "arn:aws:lambda:us-east-1:123456789012:function:checkout",
            ))
            .await;
        cloud
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let cloud = cloud_with_function().await;
        let pass = ReconciliationPass::new(cloud.clone(), cloud.clone()).with_options(PassOptions {
            dry_run: true,
            ..Default::default()
        });

        let report = pass.run(&config()).await.unwrap();
        assert_eq!(report.to_create, vec!["tw-lambda-checkout-Errors"]);
        assert!(report.apply.is_none());
        assert!(report.is_clean());
        assert!(cloud.alarm_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_makes_no_calls() {
        let cloud = cloud_with_function().await;
        let pass = ReconciliationPass::new(cloud.clone(), cloud.clone());

        let mut config = config();
        config.globals.alarm.alarm_name_prefix.clear();

        assert!(matches!(pass.run(&config).await, Err(EngineError::Config(_))));
        assert!(cloud.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_report_serializes_to_json() {
        let cloud = cloud_with_function().await;
        let report = ReconciliationPass::new(cloud.clone(), cloud.clone())
            .run(&config())
            .await
            .unwrap();

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["plan"]["create"], 1);
        assert_eq!(value["apply"]["created"][0], "tw-lambda-checkout-Errors");
    }
}
