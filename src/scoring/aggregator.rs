use super::{FeatureResolver, MeasurementSource};
use crate::config::{AnnotatorConfig, DEFAULT_FEATURE_LIMIT};
use crate::models::{MetricKind, ScoreData};

/// Zoom level asking a source for whole-interval resolution
pub const WHOLE_INTERVAL_ZOOM: i32 = -1;

/// Sources that get confused may answer with `-f32::MAX`
pub const FLOAT_SENTINEL: f32 = -f32::MAX + 1.0;

/// Integer-backed sources use `i32::MIN` as a "no value" marker
pub const INT_SENTINEL: f32 = (i32::MIN + 1) as f32;

/// Fixed parameters of an aggregation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreContext {
    pub feature_limit: usize,
    pub frame: Option<String>,
}

impl Default for ScoreContext {
    fn default() -> Self {
        Self {
            feature_limit: DEFAULT_FEATURE_LIMIT,
            frame: None,
        }
    }
}

impl From<&AnnotatorConfig> for ScoreContext {
    fn from(config: &AnnotatorConfig) -> Self {
        Self {
            feature_limit: config.feature_limit,
            frame: config.frame.clone(),
        }
    }
}

/// Whether a measurement may contribute to the average
pub fn is_valid_measurement(score: f32) -> bool {
    score > FLOAT_SENTINEL && score > INT_SENTINEL
}

/// Aggregate the measurements of `kind` for `name` across `sources`.
///
/// Returns `None` when the name resolves to no feature or no source is
/// given; callers skip such pairs entirely.
pub fn collect_score_data<R>(
    name: &str,
    sources: &[&dyn MeasurementSource],
    kind: MetricKind,
    resolver: &R,
    ctx: &ScoreContext,
) -> Option<ScoreData>
where
    R: FeatureResolver + ?Sized,
{
    if sources.is_empty() {
        return None;
    }
    let features = resolver.features(name, ctx.feature_limit);

    let samples = features.len() * sources.len();
    if samples == 0 {
        return None;
    }

    let mut total_score = 0.0f32;
    let mut total_altered = 0usize;

    for feature in &features {
        for source in sources {
            let score =
                source.region_score(feature, WHOLE_INTERVAL_ZOOM, kind, ctx.frame.as_deref());
            if is_valid_measurement(score) {
                total_score += score;
            }
            if score != 0.0 {
                total_altered += 1;
            }
        }
    }

    let samples_f = samples as f32;
    Some(ScoreData::new(
        total_score / samples_f,
        total_altered as f32 / samples_f,
    ))
}
