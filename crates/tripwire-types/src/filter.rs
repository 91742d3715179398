//! Resource filters
//!
//! A filter is a name pattern plus a tag set. The global filter and a
//! per-type filter are merged before resolution: a non-empty per-type
//! pattern replaces the global one, tag sets are unioned with per-type
//! values winning on key collisions.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::resource::TargetResource;

/// Uncompiled filter as written in configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFilter {
    /// Regex the resource name must match from its first character
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_pattern: Option<String>,

    /// Tags the resource must carry with exactly these values
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ResourceFilter {
    pub fn new(name_pattern: Option<String>, tags: BTreeMap<String, String>) -> Self {
        Self { name_pattern, tags }
    }

    /// Merge a per-type filter over this (global) filter
    pub fn merged_with(&self, overrides: &ResourceFilter) -> ResourceFilter {
        let name_pattern = match overrides.name_pattern.as_deref() {
            Some(pattern) if !pattern.is_empty() => Some(pattern.to_string()),
            _ => self.name_pattern.clone(),
        };

        let mut tags = self.tags.clone();
        tags.extend(overrides.tags.iter().map(|(k, v)| (k.clone(), v.clone())));

        ResourceFilter { name_pattern, tags }
    }

    /// Compile the name pattern; `scope` names the config entry in errors
    pub fn compile(&self, scope: &str) -> Result<CompiledFilter, ConfigError> {
        let pattern = match self.name_pattern.as_deref() {
            Some(pattern) if !pattern.is_empty() => Some(
                Regex::new(pattern).map_err(|e| ConfigError::invalid_pattern(scope, pattern, &e))?,
            ),
            _ => None,
        };

        Ok(CompiledFilter {
            pattern,
            tags: self.tags.clone(),
        })
    }
}

/// A filter ready to be applied to resources
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    pattern: Option<Regex>,
    tags: BTreeMap<String, String>,
}

impl CompiledFilter {
    /// A filter that accepts every resource
    pub fn match_all() -> Self {
        Self {
            pattern: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// True when the pattern matches starting at the first character
    pub fn matches_name(&self, name: &str) -> bool {
        match &self.pattern {
            None => true,
            Some(regex) => regex.find(name).is_some_and(|m| m.start() == 0),
        }
    }

    /// True when `tags` is a superset of the filter tags
    pub fn matches_tags(&self, tags: &BTreeMap<String, String>) -> bool {
        self.tags
            .iter()
            .all(|(key, value)| tags.get(key) == Some(value))
    }

    pub fn matches(&self, resource: &TargetResource) -> bool {
        self.matches_name(&resource.name) && self.matches_tags(&resource.tags)
    }
}
