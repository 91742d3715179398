//! Desired alarm synthesis
//!
//! Every matched resource gets one alarm per configured metric. Parameters
//! are resolved in three tiers (built-in defaults, global defaults,
//! per-metric overrides) without touching the shared layers.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use tripwire_types::{
    AlarmParams, AlarmSpec, Dimension, GlobalConfig, PartialAlarmParams, ResourceType,
    TargetResource, MAX_ALARM_NAME_LEN, OWNERSHIP_TAG_KEY,
};

use crate::resolver::{Discovery, ResourceTarget};

/// Characters kept when the name is longer than [`MAX_ALARM_NAME_LEN`]
const TRUNCATED_NAME_LEN: usize = 238;

/// Hex digits of the name hash appended to truncated names
const NAME_HASH_LEN: usize = 16;

/// Deterministic alarm name for one resource and metric
///
/// `<prefix><token>-<resource name>-<metric>`, with characters the alarm
/// API dislikes in the resource name replaced by `_`. Names over the length
/// limit keep their first 238 characters followed by `-` and a hash of the
/// full name.
pub fn alarm_name(
    prefix: &str,
    resource_type: ResourceType,
    resource_name: &str,
    metric: &str,
) -> String {
    let name = format!(
        "{}{}-{}-{}",
        prefix,
        resource_type.token(),
        sanitize(resource_name),
        metric
    );

    if name.chars().count() <= MAX_ALARM_NAME_LEN {
        return name;
    }

    let hash = blake3::hash(name.as_bytes()).to_hex();
    let head: String = name.chars().take(TRUNCATED_NAME_LEN).collect();
    format!("{}-{}", head, &hash.as_str()[..NAME_HASH_LEN])
}

fn sanitize(resource_name: &str) -> String {
    resource_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '/' | '#' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Builds [`AlarmSpec`]s from the global alarm settings
#[derive(Debug, Clone)]
pub struct AlarmSpecBuilder {
    prefix: String,
    actions: Vec<String>,
    tags: BTreeMap<String, String>,
    default_params: PartialAlarmParams,
}

impl AlarmSpecBuilder {
    /// `additional_actions` are appended after the configured actions
    pub fn new(globals: &GlobalConfig, additional_actions: &[String]) -> Self {
        let mut seen = BTreeSet::new();
        let actions = globals
            .alarm
            .alarm_actions
            .iter()
            .chain(additional_actions)
            .filter(|action| seen.insert(action.as_str()))
            .cloned()
            .collect();

        let mut tags = globals.alarm.alarm_tagging.clone();
        tags.insert(OWNERSHIP_TAG_KEY.to_string(), globals.prefix().to_string());

        Self {
            prefix: globals.prefix().to_string(),
            actions,
            tags,
            default_params: globals.alarm.default_alarm_params.clone(),
        }
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    /// One spec per metric of the rule for `resource`
    pub fn build(&self, resource: &TargetResource, rule: &ResourceTarget) -> Vec<AlarmSpec> {
        let resource_type = resource.resource_type;
        let namespace = rule.config.namespace(resource_type);
        let dimensions = vec![Dimension::new(
            resource_type.info().dimension_name,
            resource.dimension_value(),
        )];

        rule.config
            .alarm
            .metrics
            .iter()
            .map(|metric| AlarmSpec {
                name: alarm_name(&self.prefix, resource_type, &resource.name, metric),
                description: format!("Metric Alarm for `{}` of {}", metric, resource.name),
                namespace: namespace.clone(),
                metric_name: metric.clone(),
                dimensions: dimensions.clone(),
                params: AlarmParams::resolve(
                    &self.default_params,
                    rule.config.alarm.alarm_param_overrides.get(metric),
                ),
                actions: self.actions.clone(),
                tags: self.tags.clone(),
                resource_key: rule.key.clone(),
                resource_type,
                resource_name: resource.name.clone(),
            })
            .collect()
    }

    /// The full desired set, sorted by name
    ///
    /// Rules are visited in key order; when two rules produce the same
    /// name the first one wins.
    pub fn build_desired(&self, rules: &[ResourceTarget], discovery: &Discovery) -> Vec<AlarmSpec> {
        let mut ordered: Vec<&ResourceTarget> = rules.iter().collect();
        ordered.sort_by(|a, b| a.key.cmp(&b.key));

        let mut desired: BTreeMap<String, AlarmSpec> = BTreeMap::new();
        for rule in ordered {
            let Some(resources) = discovery.resources.get(&rule.key) else {
                continue;
            };

            for resource in resources {
                for spec in self.build(resource, rule) {
                    match desired.entry(spec.name.clone()) {
                        Entry::Vacant(slot) => {
                            slot.insert(spec);
                        }
                        Entry::Occupied(kept) => {
                            warn!(
                                alarm = %spec.name,
                                kept_key = %kept.get().resource_key,
                                dropped_key = %spec.resource_key,
                                "Duplicate alarm name; keeping the first rule"
                            );
                        }
                    }
                }
            }
        }

        debug!(count = desired.len(), "Built desired alarms");
        desired.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{AlarmApi, InMemoryCloud};
    use serde_json::json;
    use tripwire_types::{ComparisonOperator, ConfigModel, ResourceDescriptor, Statistic};

    fn config() -> ConfigModel {
        serde_json::from_value(json!({
            "globals": {
                "alarm": {
                    "alarm_name_prefix": "tw-",
                    "alarm_actions": ["arn:ops", "arn:pager"],
                    "default_alarm_params": { "Threshold": 5, "Statistic": "Average" },
                    "alarm_tagging": { "team": "core", "managed-by": "someone-else" }
                }
            },
            "resources": {
                "fns": {
                    "target_resource_type": "lambda:function",
                    "alarm": {
                        "metrics": ["Errors", "Throttles"],
                        "alarm_param_overrides": {
                            "Throttles": { "Threshold": 500, "ComparisonOperator": "GreaterThanThreshold" }
                        }
                    }
                },
                "machines": {
                    "target_resource_type": "states:stateMachine",
                    "alarm": { "metrics": ["ExecutionsFailed"] }
                }
            }
        }))
        .unwrap()
    }

    fn function(name: &str) -> TargetResource {
        TargetResource::from_descriptor(ResourceDescriptor::new(
            ResourceType::LambdaFunction,
            format!("arn:aws:lambda:us-east-1:123456789012:function:{}", name),
        ))
    }

    fn rule(config: &ConfigModel, key: &str) -> ResourceTarget {
        ResourceTarget::from_config(config)
            .unwrap()
            .into_iter()
            .find(|r| r.key == key)
            .unwrap()
    }

    #[test]
    fn test_one_spec_per_metric_with_layered_params() {
        let config = config();
        let builder = AlarmSpecBuilder::new(&config.globals, &[]);
        let specs = builder.build(&function("checkout"), &rule(&config, "fns"));

        assert_eq!(specs.len(), 2);
        let errors = &specs[0];
        assert_eq!(errors.name, "tw-lambda-checkout-Errors");
        assert_eq!(errors.params.threshold, 5.0);
        assert_eq!(errors.params.statistic, Statistic::Average);
        assert_eq!(errors.params.period, 60);

        let throttles = &specs[1];
        assert_eq!(throttles.params.threshold, 500.0);
        assert_eq!(throttles.params.statistic, Statistic::Average);
        assert_eq!(
            throttles.params.comparison_operator,
            ComparisonOperator::GreaterThanThreshold
        );
        assert_eq!(throttles.description, "Metric Alarm for `Throttles` of checkout");
        assert_eq!(throttles.namespace, "AWS/Lambda");
        assert_eq!(throttles.dimensions, vec![Dimension::new("FunctionName", "checkout")]);
    }

    #[test]
    fn test_ownership_tag_wins_over_configured_tags() {
        let config = config();
        let builder = AlarmSpecBuilder::new(&config.globals, &[]);
        let spec = &builder.build(&function("f"), &rule(&config, "fns"))[0];
        assert_eq!(spec.tags[OWNERSHIP_TAG_KEY], "tw-");
        assert_eq!(spec.tags["team"], "core");
    }

    #[test]
    fn test_additional_actions_are_appended_once() {
        let config = config();
        let extra = vec!["arn:pager".to_string(), "arn:chat".to_string()];
        let builder = AlarmSpecBuilder::new(&config.globals, &extra);
        assert_eq!(builder.actions(), &["arn:ops", "arn:pager", "arn:chat"]);
    }

    #[test]
    fn test_state_machine_dimension_uses_arn() {
        let config = config();
        let builder = AlarmSpecBuilder::new(&config.globals, &[]);
        let arn = "arn:aws:states:us-east-1:123456789012:stateMachine:ingest";
        let machine = TargetResource::from_descriptor(ResourceDescriptor::new(
            ResourceType::StateMachine,
            arn,
        ));

        let spec = &builder.build(&machine, &rule(&config, "machines"))[0];
        assert_eq!(spec.name, "tw-sfn-ingest-ExecutionsFailed");
        assert_eq!(spec.dimensions, vec![Dimension::new("StateMachineArn", arn)]);
    }

    #[test]
    fn test_name_sanitizes_resource_name() {
        let name = alarm_name("tw-", ResourceType::RestApi, "my api (v2)", "5XXError");
        assert_eq!(name, "tw-apigw-my_api__v2_-5XXError");
    }

    #[test]
    fn test_long_name_is_truncated_with_hash() {
        let long = "x".repeat(400);
        let name = alarm_name("tw-", ResourceType::SqsQueue, &long, "NumberOfMessagesSent");
        assert_eq!(name.chars().count(), MAX_ALARM_NAME_LEN);
        assert!(name.starts_with("tw-sqs-xxx"));
        assert_eq!(name, alarm_name("tw-", ResourceType::SqsQueue, &long, "NumberOfMessagesSent"));

        let other = alarm_name("tw-", ResourceType::SqsQueue, &long, "NumberOfMessagesDeleted");
        assert_ne!(name, other);
    }

    #[tokio::test]
    async fn test_truncated_name_with_accented_prefix_is_accepted() {
        let mut config = config();
        config.globals.alarm.alarm_name_prefix = "tw-é-".to_string();
        let builder = AlarmSpecBuilder::new(&config.globals, &[]);
        let specs = builder.build(&function(&"x".repeat(400)), &rule(&config, "fns"));

        let name = &specs[0].name;
        assert_eq!(name.chars().count(), MAX_ALARM_NAME_LEN);
        assert!(name.len() > MAX_ALARM_NAME_LEN);
        assert!(name.starts_with("tw-é-lambda-"));

        let cloud = InMemoryCloud::new();
        for spec in &specs {
            cloud.put_metric_alarm(spec).await.unwrap();
        }
        assert_eq!(cloud.alarm_names().await.len(), 2);
    }

    #[test]
    fn test_duplicate_names_keep_first_rule() {
        let config: ConfigModel = serde_json::from_value(json!({
            "globals": { "alarm": { "alarm_name_prefix": "tw-" } },
            "resources": {
                "b-fns": {
                    "target_resource_type": "lambda:function",
                    "alarm": { "metrics": ["Errors"], "alarm_param_overrides": { "Errors": { "Threshold": 9 } } }
                },
                "a-fns": {
                    "target_resource_type": "lambda:function",
                    "alarm": { "metrics": ["Errors"] }
                }
            }
        }))
        .unwrap();
        let rules = ResourceTarget::from_config(&config).unwrap();
        let builder = AlarmSpecBuilder::new(&config.globals, &[]);

        let mut discovery = Discovery::default();
        for key in ["a-fns", "b-fns"] {
            discovery
                .resources
                .insert(key.to_string(), [function("shared")].into_iter().collect());
        }

        let desired = builder.build_desired(&rules, &discovery);
        assert_eq!(desired.len(), 1);
        assert_eq!(desired[0].resource_key, "a-fns");
        assert_eq!(desired[0].params.threshold, 1.0);
    }
}
