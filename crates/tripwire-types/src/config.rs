//! Declarative reconciliation configuration
//!
//! The model mirrors the configuration file layout:
//!
//! ```yaml
//! globals:
//!   api_call_intervals_in_millis: 200
//!   alarm:
//!     alarm_name_prefix: "tripwire-"
//!     alarm_actions: ["arn:aws:sns:us-east-1:123456789012:ops"]
//!     default_alarm_params: { Threshold: 1 }
//! resources:
//!   lambda:
//!     target_resource_type: "lambda:function"
//!     alarm:
//!       metrics: [Errors, Throttles]
//!       alarm_param_overrides:
//!         Throttles: { Threshold: 500 }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::ConfigError;
use crate::filter::ResourceFilter;
use crate::params::{AlarmParams, PartialAlarmParams};
use crate::resource::ResourceType;

/// Default pause between consecutive alarm API calls
pub const DEFAULT_API_CALL_INTERVAL_MILLIS: u64 = 100;

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigModel {
    pub globals: GlobalConfig,

    /// Resource rules keyed by a user-chosen name
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceConfig>,
}

/// Settings shared by every resource rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_resource_name_pattern: Option<String>,

    #[serde(default)]
    pub target_resource_tags: BTreeMap<String, String>,

    /// Minimum pause between alarm API calls in milliseconds
    #[serde(default = "default_api_interval")]
    pub api_call_intervals_in_millis: u64,

    pub alarm: GlobalAlarmConfig,
}

/// Alarm settings shared by every resource rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalAlarmConfig {
    /// Ownership marker; only alarms whose name starts with it are managed
    pub alarm_name_prefix: String,

    #[serde(default)]
    pub alarm_actions: Vec<String>,

    #[serde(default)]
    pub default_alarm_params: PartialAlarmParams,

    #[serde(default)]
    pub alarm_tagging: BTreeMap<String, String>,
}

/// One resource rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub target_resource_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_resource_name_pattern: Option<String>,

    #[serde(default)]
    pub target_resource_tags: BTreeMap<String, String>,

    pub alarm: ResourceAlarmConfig,
}

/// Alarm settings for one resource rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAlarmConfig {
    /// Metric namespace; defaults to the resource type's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    pub metrics: Vec<String>,

    #[serde(default)]
    pub alarm_param_overrides: BTreeMap<String, PartialAlarmParams>,
}

fn default_api_interval() -> u64 {
    DEFAULT_API_CALL_INTERVAL_MILLIS
}

impl GlobalConfig {
    pub fn filter(&self) -> ResourceFilter {
        ResourceFilter::new(
            self.target_resource_name_pattern.clone(),
            self.target_resource_tags.clone(),
        )
    }

    pub fn prefix(&self) -> &str {
        &self.alarm.alarm_name_prefix
    }
}

impl ResourceConfig {
    pub fn filter(&self) -> ResourceFilter {
        ResourceFilter::new(
            self.target_resource_name_pattern.clone(),
            self.target_resource_tags.clone(),
        )
    }

    /// Parse the configured type string
    pub fn resource_type(&self, key: &str) -> Result<ResourceType, ConfigError> {
        self.target_resource_type
            .parse()
            .map_err(|_| ConfigError::UnknownResourceType {
                key: key.to_string(),
                type_name: self.target_resource_type.clone(),
            })
    }

    /// Namespace to use for this rule's alarms
    pub fn namespace(&self, resource_type: ResourceType) -> String {
        match self.alarm.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ => resource_type.default_namespace().to_string(),
        }
    }
}

impl ConfigModel {
    /// Check everything that can be checked without calling the cloud
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_prefix()?;

        for (index, action) in self.globals.alarm.alarm_actions.iter().enumerate() {
            if action.trim().is_empty() {
                return Err(ConfigError::EmptyAction { index });
            }
        }

        let global_filter = self.globals.filter();
        global_filter.compile("globals")?;

        let global_params = AlarmParams::resolve(&self.globals.alarm.default_alarm_params, None);
        global_params
            .check()
            .map_err(|reason| ConfigError::InvalidParams {
                scope: "globals.alarm.default_alarm_params".to_string(),
                reason,
            })?;

        for (key, resource) in &self.resources {
            resource.resource_type(key)?;
            global_filter
                .merged_with(&resource.filter())
                .compile(&format!("resources.{}", key))?;
            self.validate_metrics(key, resource)?;
        }

        Ok(())
    }

    fn validate_prefix(&self) -> Result<(), ConfigError> {
        let prefix = self.globals.prefix();
        if prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if prefix.chars().any(char::is_control) {
            return Err(ConfigError::InvalidPrefix {
                prefix: prefix.to_string(),
                reason: "contains control characters".to_string(),
            });
        }
        // Leave room for the type token, a resource name and a metric name
        if prefix.chars().count() > crate::alarm::MAX_ALARM_NAME_LEN / 2 {
            return Err(ConfigError::InvalidPrefix {
                prefix: prefix.to_string(),
                reason: format!("longer than {} characters", crate::alarm::MAX_ALARM_NAME_LEN / 2),
            });
        }
        Ok(())
    }

    fn validate_metrics(&self, key: &str, resource: &ResourceConfig) -> Result<(), ConfigError> {
        let metrics = &resource.alarm.metrics;
        if metrics.is_empty() {
            return Err(ConfigError::NoMetrics {
                key: key.to_string(),
            });
        }

        let mut seen = BTreeSet::new();
        for metric in metrics {
            if metric.trim().is_empty() {
                return Err(ConfigError::InvalidMetric {
                    key: key.to_string(),
                    metric: metric.clone(),
                    reason: "metric name is empty".to_string(),
                });
            }
            if !seen.insert(metric.as_str()) {
                return Err(ConfigError::InvalidMetric {
                    key: key.to_string(),
                    metric: metric.clone(),
                    reason: "listed more than once".to_string(),
                });
            }

            let params = AlarmParams::resolve(
                &self.globals.alarm.default_alarm_params,
                resource.alarm.alarm_param_overrides.get(metric),
            );
            params.check().map_err(|reason| ConfigError::InvalidParams {
                scope: format!("resources.{}.{}", key, metric),
                reason,
            })?;
        }

        if let Some(metric) = resource
            .alarm
            .alarm_param_overrides
            .keys()
            .find(|m| !seen.contains(m.as_str()))
        {
            return Err(ConfigError::UnknownMetricOverride {
                key: key.to_string(),
                metric: metric.clone(),
            });
        }

        Ok(())
    }
}
