//! Configuration error types
//!
//! Every variant is raised before any cloud API call is made, so a
//! configuration error never leaves alarms half-reconciled.

use thiserror::Error;

/// Errors found while validating a [`crate::ConfigModel`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The ownership prefix is empty
    #[error("Alarm name prefix must not be empty")]
    EmptyPrefix,

    /// The ownership prefix cannot be used in alarm names
    #[error("Invalid alarm name prefix {prefix:?}: {reason}")]
    InvalidPrefix { prefix: String, reason: String },

    /// A resource entry names a type that is not supported
    #[error("Unknown resource type {type_name:?} for resource key {key:?}")]
    UnknownResourceType { key: String, type_name: String },

    /// A name pattern does not compile
    #[error("Invalid name pattern {pattern:?} for {scope}: {reason}")]
    InvalidPattern {
        scope: String,
        pattern: String,
        reason: String,
    },

    /// A resource entry has an empty metric list
    #[error("Resource key {key:?} has no metrics")]
    NoMetrics { key: String },

    /// A metric name is empty or repeated
    #[error("Resource key {key:?} has an invalid metric entry {metric:?}: {reason}")]
    InvalidMetric {
        key: String,
        metric: String,
        reason: String,
    },

    /// An override targets a metric missing from the metric list
    #[error("Resource key {key:?} overrides metric {metric:?} which is not in its metric list")]
    UnknownMetricOverride { key: String, metric: String },

    /// Resolved alarm parameters are out of range
    #[error("Invalid alarm parameters for {scope}: {reason}")]
    InvalidParams { scope: String, reason: String },

    /// An alarm action target is blank
    #[error("Alarm action at position {index} is empty")]
    EmptyAction { index: usize },
}

impl ConfigError {
    /// Create a pattern error from a regex compile failure
    pub fn invalid_pattern(scope: impl Into<String>, pattern: &str, err: &regex::Error) -> Self {
        Self::InvalidPattern {
            scope: scope.into(),
            pattern: pattern.to_string(),
            reason: err.to_string(),
        }
    }
}
