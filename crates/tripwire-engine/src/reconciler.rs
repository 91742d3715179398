//! Desired vs. existing diff
//!
//! Identity is the alarm name. An alarm whose name is both desired and
//! existing is left alone even if its settings drifted.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tripwire_types::{AlarmSpec, ExistingAlarm};

/// Actions needed to converge one prefix
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// Desired alarms that do not exist yet, sorted by name
    pub to_create: Vec<AlarmSpec>,
    /// Owned alarms that are no longer desired, sorted
    pub to_delete: Vec<String>,
    /// Names present on both sides, sorted
    pub unchanged: Vec<String>,
}

/// Counts for reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub create: usize,
    pub delete: usize,
    pub unchanged: usize,
}

/// Compute the plan for `prefix`
///
/// Existing alarms without the prefix never end up in `to_delete`. When
/// `desired` repeats a name, the first occurrence is kept.
pub fn diff<'a>(
    desired: impl IntoIterator<Item = &'a AlarmSpec>,
    existing: impl IntoIterator<Item = &'a ExistingAlarm>,
    prefix: &str,
) -> ReconcilePlan {
    let mut wanted: BTreeMap<&str, &AlarmSpec> = BTreeMap::new();
    for spec in desired {
        wanted.entry(spec.name.as_str()).or_insert(spec);
    }

    let owned: BTreeSet<&str> = existing
        .into_iter()
        .map(|alarm| alarm.name.as_str())
        .filter(|name| name.starts_with(prefix))
        .collect();

    let mut plan = ReconcilePlan::default();
    for (name, spec) in &wanted {
        if owned.contains(name) {
            plan.unchanged.push(name.to_string());
        } else {
            plan.to_create.push((*spec).clone());
        }
    }
    plan.to_delete = owned
        .into_iter()
        .filter(|name| !wanted.contains_key(name))
        .map(str::to_string)
        .collect();

    plan
}

impl ReconcilePlan {
    /// Nothing to create or delete
    pub fn is_converged(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.to_create.len(),
            delete: self.to_delete.len(),
            unchanged: self.unchanged.len(),
        }
    }

    /// Drop deletions whose name starts with any of `prefixes`
    ///
    /// Returns the names that were held back.
    pub fn protect(&mut self, prefixes: &[String]) -> Vec<String> {
        if prefixes.is_empty() {
            return Vec::new();
        }

        let (held, kept): (Vec<String>, Vec<String>) = std::mem::take(&mut self.to_delete)
            .into_iter()
            .partition(|name| prefixes.iter().any(|p| name.starts_with(p.as_str())));
        self.to_delete = kept;
        held
    }

    pub fn create_names(&self) -> Vec<String> {
        self.to_create.iter().map(|s| s.name.clone()).collect()
    }
}
