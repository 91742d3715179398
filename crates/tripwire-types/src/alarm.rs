//! Desired and existing alarms

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::params::AlarmParams;
use crate::resource::ResourceType;

/// Longest alarm name the alarm API accepts, in characters
pub const MAX_ALARM_NAME_LEN: usize = 255;

/// Tag key marking an alarm as managed by this tool
pub const OWNERSHIP_TAG_KEY: &str = "managed-by";

/// Metric dimension
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An alarm that should exist
///
/// `name` is a pure function of the ownership prefix, the resource type,
/// the resource name and the metric name. Two specs with equal names are
/// treated as the same alarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmSpec {
    pub name: String,
    pub description: String,
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
    pub params: AlarmParams,

    /// Notification targets used for the alarm, OK and insufficient-data states
    pub actions: Vec<String>,

    pub tags: BTreeMap<String, String>,

    /// Configuration key this alarm was generated from
    pub resource_key: String,
    pub resource_type: ResourceType,
    pub resource_name: String,
}

/// An owned alarm as reported by the alarm API
///
/// Only `name` takes part in reconciliation. The remaining fields are
/// carried for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingAlarm {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<Dimension>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl ExistingAlarm {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            metric_name: None,
            dimensions: Vec::new(),
            tags: BTreeMap::new(),
        }
    }
}

impl From<&AlarmSpec> for ExistingAlarm {
    fn from(spec: &AlarmSpec) -> Self {
        Self {
            name: spec.name.clone(),
            namespace: Some(spec.namespace.clone()),
            metric_name: Some(spec.metric_name.clone()),
            dimensions: spec.dimensions.clone(),
            tags: spec.tags.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_alarm_defaults_when_deserialized_by_name() {
        let alarm: ExistingAlarm =
            serde_json::from_value(serde_json::json!({ "name": "tw-lambda-f-Errors" })).unwrap();
        assert_eq!(alarm, ExistingAlarm::named("tw-lambda-f-Errors"));
    }

    #[test]
    fn test_dimension_serializes_with_api_spelling() {
        let json = serde_json::to_value(Dimension::new("FunctionName", "checkout")).unwrap();
        assert_eq!(json, serde_json::json!({ "Name": "FunctionName", "Value": "checkout" }));
    }
}
