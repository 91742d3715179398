//! Alarm parameters and their layering
//!
//! Parameters resolve in three tiers, lowest precedence first:
//!
//! 1. built-in defaults ([`AlarmParams::default`])
//! 2. `globals.alarm.default_alarm_params`
//! 3. `resources.<key>.alarm.alarm_param_overrides.<metric>`
//!
//! Each tier is a [`PartialAlarmParams`] that replaces only the keys it sets.
//! Field names follow the alarm API spelling (`Threshold`, `Period`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Statistic applied to the metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    SampleCount,
    Average,
    Sum,
    Minimum,
    Maximum,
}

impl Statistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::SampleCount => "SampleCount",
            Statistic::Average => "Average",
            Statistic::Sum => "Sum",
            Statistic::Minimum => "Minimum",
            Statistic::Maximum => "Maximum",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison between the statistic and the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    GreaterThanOrEqualToThreshold,
    GreaterThanThreshold,
    LessThanThreshold,
    LessThanOrEqualToThreshold,
    LessThanLowerOrGreaterThanUpperThreshold,
    LessThanLowerThreshold,
    GreaterThanUpperThreshold,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GreaterThanOrEqualToThreshold => "GreaterThanOrEqualToThreshold",
            Self::GreaterThanThreshold => "GreaterThanThreshold",
            Self::LessThanThreshold => "LessThanThreshold",
            Self::LessThanOrEqualToThreshold => "LessThanOrEqualToThreshold",
            Self::LessThanLowerOrGreaterThanUpperThreshold => {
                "LessThanLowerOrGreaterThanUpperThreshold"
            }
            Self::LessThanLowerThreshold => "LessThanLowerThreshold",
            Self::GreaterThanUpperThreshold => "GreaterThanUpperThreshold",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How missing data points are evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TreatMissingData {
    Breaching,
    NotBreaching,
    Ignore,
    Missing,
}

impl TreatMissingData {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreatMissingData::Breaching => "breaching",
            TreatMissingData::NotBreaching => "notBreaching",
            TreatMissingData::Ignore => "ignore",
            TreatMissingData::Missing => "missing",
        }
    }
}

impl fmt::Display for TreatMissingData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved alarm parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlarmParams {
    pub statistic: Statistic,

    /// Evaluation period in seconds
    pub period: u32,

    pub evaluation_periods: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datapoints_to_alarm: Option<u32>,

    pub threshold: f64,

    pub comparison_operator: ComparisonOperator,

    pub treat_missing_data: TreatMissingData,
}

impl Default for AlarmParams {
    fn default() -> Self {
        Self {
            statistic: Statistic::Sum,
            period: 60,
            evaluation_periods: 1,
            datapoints_to_alarm: None,
            threshold: 1.0,
            comparison_operator: ComparisonOperator::GreaterThanOrEqualToThreshold,
            treat_missing_data: TreatMissingData::NotBreaching,
        }
    }
}

impl AlarmParams {
    /// Resolve the three tiers into one parameter set
    pub fn resolve(global: &PartialAlarmParams, metric_override: Option<&PartialAlarmParams>) -> Self {
        let params = global.apply_to(AlarmParams::default());
        match metric_override {
            Some(overrides) => overrides.apply_to(params),
            None => params,
        }
    }

    /// Check value ranges the alarm API would reject
    pub fn check(&self) -> Result<(), String> {
        if self.period == 0 {
            return Err("Period must be greater than 0".to_string());
        }
        if self.evaluation_periods == 0 {
            return Err("EvaluationPeriods must be greater than 0".to_string());
        }
        if let Some(datapoints) = self.datapoints_to_alarm {
            if datapoints == 0 || datapoints > self.evaluation_periods {
                return Err(format!(
                    "DatapointsToAlarm ({}) must be between 1 and EvaluationPeriods ({})",
                    datapoints, self.evaluation_periods
                ));
            }
        }
        if !self.threshold.is_finite() {
            return Err("Threshold must be a finite number".to_string());
        }
        Ok(())
    }
}

/// One layer of alarm parameters; unset keys fall through to lower layers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct PartialAlarmParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistic: Option<Statistic>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_periods: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datapoints_to_alarm: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_operator: Option<ComparisonOperator>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treat_missing_data: Option<TreatMissingData>,
}

impl PartialAlarmParams {
    pub fn is_empty(&self) -> bool {
        *self == PartialAlarmParams::default()
    }

    /// Return `base` with every key set in this layer replaced
    pub fn apply_to(&self, base: AlarmParams) -> AlarmParams {
        AlarmParams {
            statistic: self.statistic.unwrap_or(base.statistic),
            period: self.period.unwrap_or(base.period),
            evaluation_periods: self.evaluation_periods.unwrap_or(base.evaluation_periods),
            datapoints_to_alarm: self.datapoints_to_alarm.or(base.datapoints_to_alarm),
            threshold: self.threshold.unwrap_or(base.threshold),
            comparison_operator: self.comparison_operator.unwrap_or(base.comparison_operator),
            treat_missing_data: self.treat_missing_data.unwrap_or(base.treat_missing_data),
        }
    }
}
