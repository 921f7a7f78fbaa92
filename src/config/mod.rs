//! Configuration for annotation and network fetching
//!
//! Everything the engine needs is passed in explicitly as an
//! [`AnnotatorConfig`]; nothing is read from the environment.
//!
//! # Configuration Format
//!
//! ```toml
//! # annotator.toml
//! diagnostic_mode = false
//! record_average_scores = false
//! repeat_policy = "append"   # or "replace"
//!
//! [[metrics]]
//! name = "PERCENT_MUTATED"
//! kind = "mutation_count"
//!
//! [fetch]
//! base_url = "http://www.cbioportal.org/public-portal/webservice.do"
//! timeout_secs = 60
//! ```

use crate::models::MetricKind;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Endpoint the network service is published on
pub const PRODUCTION_URL: &str = "http://www.cbioportal.org/public-portal/webservice.do";

/// Endpoint used while the service is under test
pub const TEST_URL: &str = "http://awabi.cbio.mskcc.org/public-portal/network.do";

/// Upper bound on features an entity name may resolve to
pub const DEFAULT_FEATURE_LIMIT: usize = i32::MAX as usize;

/// Metric names written by `annotate_all`, with the measurement each aggregates
pub const DEFAULT_METRICS: &[(&str, MetricKind)] = &[
    ("PERCENT_MUTATED", MetricKind::MutationCount),
    ("PERCENT_CNA_AMPLIFIED", MetricKind::Amplification),
    ("PERCENT_CNA_HOMOZYGOUSLY_DELETED", MetricKind::Deletion),
];

/// A metric name bound to the measurement kind it aggregates
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetricBinding {
    pub name: String,
    pub kind: MetricKind,
}

impl MetricBinding {
    pub fn new(name: &str, kind: MetricKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// What a repeated `annotate` call does with metrics already present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepeatPolicy {
    /// Append new entries and schema keys next to existing ones (duplicates)
    #[default]
    Append,
    /// Drop existing entries for the metric and replace its schema key
    Replace,
}

/// Remote network service settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Responses larger than this are rejected
    pub max_body_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: TEST_URL.to_string(),
            timeout_secs: 60,
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Annotation settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Metrics used by `annotate_all`, and the name → kind mapping for `annotate`
    pub metrics: Vec<MetricBinding>,
    /// Write entries for unaltered nodes too ("0.0")
    pub diagnostic_mode: bool,
    /// Also write `<metric>_AVERAGE` entries with the mean score
    pub record_average_scores: bool,
    pub repeat_policy: RepeatPolicy,
    pub feature_limit: usize,
    /// Reference frame passed to measurement sources; none outside a UI
    pub frame: Option<String>,
    pub fetch: FetchConfig,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            metrics: DEFAULT_METRICS
                .iter()
                .map(|(name, kind)| MetricBinding::new(name, *kind))
                .collect(),
            diagnostic_mode: false,
            record_average_scores: false,
            repeat_policy: RepeatPolicy::default(),
            feature_limit: DEFAULT_FEATURE_LIMIT,
            frame: None,
            fetch: FetchConfig::default(),
        }
    }
}

impl AnnotatorConfig {
    /// Parse a TOML configuration; missing fields keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid annotator configuration")
    }

    /// Measurement kind for a metric name (exact match first, then case-insensitive)
    pub fn metric_kind(&self, name: &str) -> Option<MetricKind> {
        self.metrics
            .iter()
            .find(|m| m.name == name)
            .or_else(|| {
                self.metrics
                    .iter()
                    .find(|m| crate::graph::eq_ignore_case(&m.name, name))
            })
            .map(|m| m.kind)
    }

    /// Names of the configured metrics, in order
    pub fn metric_names(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn with_diagnostic_mode(mut self, on: bool) -> Self {
        self.diagnostic_mode = on;
        self
    }

    pub fn with_repeat_policy(mut self, policy: RepeatPolicy) -> Self {
        self.repeat_policy = policy;
        self
    }

    pub fn with_metric(mut self, name: &str, kind: MetricKind) -> Self {
        self.metrics.push(MetricBinding::new(name, kind));
        self
    }
}

/// Load an annotator configuration file
pub fn load_config(path: &Path) -> Result<AnnotatorConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config '{}'", path.display()))?;
    let config = AnnotatorConfig::from_toml_str(&content)
        .with_context(|| format!("Failed to parse '{}'", path.display()))?;
    debug!(
        "Loaded config from {} ({} metrics)",
        path.display(),
        config.metrics.len()
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnnotatorConfig::default();
        assert_eq!(
            config.metric_names(),
            vec![
                "PERCENT_MUTATED",
                "PERCENT_CNA_AMPLIFIED",
                "PERCENT_CNA_HOMOZYGOUSLY_DELETED"
            ]
        );
        assert!(!config.diagnostic_mode);
        assert_eq!(config.repeat_policy, RepeatPolicy::Append);
        assert_eq!(config.fetch.base_url, TEST_URL);
        assert_eq!(config.feature_limit, i32::MAX as usize);
    }

    #[test]
    fn test_metric_kind_lookup() {
        let config = AnnotatorConfig::default();
        assert_eq!(
            config.metric_kind("PERCENT_CNA_AMPLIFIED"),
            Some(MetricKind::Amplification)
        );
        assert_eq!(
            config.metric_kind("percent_mutated"),
            Some(MetricKind::MutationCount)
        );
        assert_eq!(config.metric_kind("EXPRESSION"), None);
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
diagnostic_mode = true
repeat_policy = "replace"

[[metrics]]
name = "MUT"
kind = "mutation_count"

[fetch]
base_url = "http://www.cbioportal.org/public-portal/webservice.do"
"#;
        let config = AnnotatorConfig::from_toml_str(toml_str).unwrap();
        assert!(config.diagnostic_mode);
        assert_eq!(config.repeat_policy, RepeatPolicy::Replace);
        assert_eq!(config.metrics, vec![MetricBinding::new("MUT", MetricKind::MutationCount)]);
        assert_eq!(config.fetch.base_url, PRODUCTION_URL);
        assert_eq!(config.fetch.timeout_secs, 60);
        assert!(!config.record_average_scores);
    }

    #[test]
    fn test_toml_rejects_unknown_kind() {
        let toml_str = r#"
[[metrics]]
name = "EXPR"
kind = "expression"
"#;
        assert!(AnnotatorConfig::from_toml_str(toml_str).is_err());
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("annotator.toml");
        std::fs::write(&path, "record_average_scores = true\n").expect("write config");

        let config = load_config(&path).expect("load config");
        assert!(config.record_average_scores);
        assert_eq!(config.metrics.len(), 3);

        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }
}
