//! Core data models for the annotation engine
//!
//! These models are shared between the score aggregator, the annotator
//! and the configuration layer.

use serde::{Deserialize, Serialize};

/// Category of external measurement being aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Number of mutations observed over a region
    MutationCount,
    /// Copy-number amplification
    Amplification,
    /// Copy-number (homozygous) deletion
    Deletion,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::MutationCount => write!(f, "mutation_count"),
            MetricKind::Amplification => write!(f, "amplification"),
            MetricKind::Deletion => write!(f, "deletion"),
        }
    }
}

/// A genomic interval an entity name resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomicFeature {
    pub name: String,
    pub chr: String,
    pub start: u64,
    pub end: u64,
}

impl GenomicFeature {
    pub fn new(name: &str, chr: &str, start: u64, end: u64) -> Self {
        Self {
            name: name.to_string(),
            chr: chr.to_string(),
            start,
            end,
        }
    }

    /// Interval length in bases
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Summary statistics for one (entity, sources, metric) aggregation.
///
/// Only ever built for a non-zero sample count; an empty sample set is
/// reported as `None` by the aggregator instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreData {
    /// Mean of the valid measurements over all samples.
    /// For 0, 1, 2, 3 this is 6 / 4.
    pub avg_score: f32,

    /// Fraction of samples with a non-zero measurement, whatever its value.
    /// For 0, 1, 2, 3 this is 3 / 4.
    pub percent_altered: f32,
}

impl ScoreData {
    pub fn new(avg_score: f32, percent_altered: f32) -> Self {
        Self {
            avg_score,
            percent_altered,
        }
    }

    /// True when no sample carried an alteration
    pub fn is_unaltered(&self) -> bool {
        self.percent_altered == 0.0
    }
}
