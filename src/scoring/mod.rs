//! Score aggregation over external measurement sources
//!
//! Turns an entity name into a [`ScoreData`](crate::models::ScoreData)
//! summary: the entity is resolved to genomic features, every
//! (feature, source) pair yields one raw measurement, and the measurements
//! are folded into two numbers.
//!
//! # Aggregation
//!
//! ```text
//! samples         = features × sources        (0 → no data)
//! avg_score       = Σ valid measurements / samples
//! percent_altered = #(measurement ≠ 0)   / samples
//! ```
//!
//! A measurement is *valid* when it lies above both sentinels some sources
//! emit for "no coverage" (`-f32::MAX + 1` and `i32::MIN + 1`). Sentinels
//! are kept out of the average but still count as altered, since they are
//! non-zero.
//!
//! # Example
//!
//! Two features × two sources measuring 0, 1, 2, 3:
//! avg_score = 6 / 4 = 1.5, percent_altered = 3 / 4 = 0.75.

mod aggregator;
mod features;

pub use aggregator::{
    collect_score_data, is_valid_measurement, ScoreContext, INT_SENTINEL, FLOAT_SENTINEL,
    WHOLE_INTERVAL_ZOOM,
};
pub use features::FeatureTable;

use crate::models::{GenomicFeature, MetricKind};

/// Resolves an entity name to the genomic features it covers
pub trait FeatureResolver {
    /// At most `limit` features for `name`; empty when the name is unknown
    fn features(&self, name: &str, limit: usize) -> Vec<GenomicFeature>;
}

/// A track that can summarise a genomic interval as a single number
pub trait MeasurementSource {
    /// Raw measurement of `kind` over `feature`.
    ///
    /// `zoom` is [`WHOLE_INTERVAL_ZOOM`] for whole-interval resolution;
    /// `frame` names the reference frame in interactive use.
    fn region_score(
        &self,
        feature: &GenomicFeature,
        zoom: i32,
        kind: MetricKind,
        frame: Option<&str>,
    ) -> f32;

    /// Short name for diagnostics
    fn name(&self) -> &str {
        "source"
    }
}

impl<T: FeatureResolver + ?Sized> FeatureResolver for &T {
    fn features(&self, name: &str, limit: usize) -> Vec<GenomicFeature> {
        (**self).features(name, limit)
    }
}
