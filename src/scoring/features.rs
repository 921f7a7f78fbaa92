use super::FeatureResolver;
use crate::models::GenomicFeature;
use std::collections::HashMap;

/// In-memory feature index keyed by upper-cased entity name
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    features: HashMap<String, Vec<GenomicFeature>>,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a feature under `name`; a name may map to several features
    pub fn insert(&mut self, name: &str, feature: GenomicFeature) {
        self.features
            .entry(name.to_uppercase())
            .or_default()
            .push(feature);
    }

    /// Register features under their own names
    pub fn extend<I: IntoIterator<Item = GenomicFeature>>(&mut self, features: I) {
        for feature in features {
            let name = feature.name.clone();
            self.insert(&name, feature);
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FeatureResolver for FeatureTable {
    fn features(&self, name: &str, limit: usize) -> Vec<GenomicFeature> {
        self.features
            .get(&name.to_uppercase())
            .map(|found| found.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }
}
