//! Per-node metric annotation
//!
//! For every node with a label and every requested metric, the label is
//! aggregated against the measurement sources and the node receives a
//! `<data key="METRIC">percent_altered</data>` entry. A schema key
//! (`float`, scope `node`) is registered for every requested metric once
//! all nodes are done.
//!
//! Pairs are skipped when the aggregator reports no data, and when nothing
//! was altered unless diagnostic mode is on.

use crate::config::{AnnotatorConfig, RepeatPolicy};
use crate::graph::{DataType, Document, KeyScope, SchemaKey};
use crate::models::MetricKind;
use crate::scoring::{collect_score_data, FeatureResolver, MeasurementSource, ScoreContext};
use tracing::{debug, info, warn};

/// Suffix of the keys carrying mean scores
pub const AVERAGE_SUFFIX: &str = "_AVERAGE";

/// Counts from one annotation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationSummary {
    pub nodes_visited: usize,
    pub nodes_without_label: usize,
    pub entries_written: usize,
    /// (node, metric) pairs the aggregator had no data for
    pub no_data: usize,
    /// (node, metric) pairs skipped because nothing was altered
    pub unaltered_skipped: usize,
    pub unknown_metrics: usize,
}

/// Annotates documents using one feature resolver and configuration
pub struct Annotator<'a, R: FeatureResolver + ?Sized> {
    resolver: &'a R,
    config: &'a AnnotatorConfig,
    ctx: ScoreContext,
}

impl<'a, R: FeatureResolver + ?Sized> Annotator<'a, R> {
    pub fn new(resolver: &'a R, config: &'a AnnotatorConfig) -> Self {
        Self {
            resolver,
            config,
            ctx: ScoreContext::from(config),
        }
    }

    /// Annotate with every configured metric
    pub fn annotate_all(
        &self,
        doc: &mut Document,
        sources: &[&dyn MeasurementSource],
    ) -> AnnotationSummary {
        let names = self.config.metric_names();
        self.annotate(doc, sources, &names)
    }

    /// Annotate with the given metric names, in order
    pub fn annotate<S: AsRef<str>>(
        &self,
        doc: &mut Document,
        sources: &[&dyn MeasurementSource],
        metric_names: &[S],
    ) -> AnnotationSummary {
        let mut summary = AnnotationSummary::default();
        let replace = self.config.repeat_policy == RepeatPolicy::Replace;

        let metrics: Vec<(&str, Option<MetricKind>)> = metric_names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let kind = self.config.metric_kind(name);
                if kind.is_none() {
                    warn!("Unknown metric '{}', no entries will be written", name);
                    summary.unknown_metrics += 1;
                }
                (name, kind)
            })
            .collect();

        doc.graph.visit_nodes_mut(&mut |node| {
            summary.nodes_visited += 1;
            let Some(label) = node.label().map(str::to_owned) else {
                debug!("Node '{}' has no label, skipping", node.id);
                summary.nodes_without_label += 1;
                return;
            };

            for &(name, kind) in &metrics {
                let Some(kind) = kind else {
                    continue;
                };
                if replace {
                    node.remove_data(name);
                    if self.config.record_average_scores {
                        node.remove_data(&average_key(name));
                    }
                }

                let Some(data) =
                    collect_score_data(&label, sources, kind, self.resolver, &self.ctx)
                else {
                    summary.no_data += 1;
                    continue;
                };
                if data.is_unaltered() && !self.config.diagnostic_mode {
                    summary.unaltered_skipped += 1;
                    continue;
                }

                node.push_data(name, format_score(data.percent_altered));
                summary.entries_written += 1;
                if self.config.record_average_scores {
                    node.push_data(&average_key(name), format_score(data.avg_score));
                    summary.entries_written += 1;
                }
            }
        });

        for &(name, _) in &metrics {
            self.register_key(doc, name, replace);
            if self.config.record_average_scores {
                self.register_key(doc, &average_key(name), replace);
            }
        }

        info!(
            "Annotated {} nodes: {} entries written, {} without data, {} unaltered skipped",
            summary.nodes_visited,
            summary.entries_written,
            summary.no_data,
            summary.unaltered_skipped
        );
        summary
    }

    fn register_key(&self, doc: &mut Document, id: &str, replace: bool) {
        let key = SchemaKey::new(id, DataType::Float).with_scope(KeyScope::Node);
        if replace {
            doc.upsert_key(key);
        } else {
            doc.push_key(key);
        }
    }
}

/// Key of the mean-score entry for `metric`
pub fn average_key(metric: &str) -> String {
    format!("{}{}", metric, AVERAGE_SUFFIX)
}

/// Shortest text that reads back as the same float, in the form the JVM
/// prints floats: plain decimals (`0.0`, `0.75`, `1.0`) for magnitudes in
/// `[1e-3, 1e7)`, otherwise `d.dddE±n` (`5.0E-4`, `1.0E7`).
pub fn format_score(value: f32) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        return text.to_string();
    }
    let magnitude = value.abs();
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        return format!("{:?}", value);
    }

    let sci = format!("{:e}", value);
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    if mantissa.contains('.') {
        format!("{}E{}", mantissa, exponent)
    } else {
        format!("{}.0E{}", mantissa, exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use crate::models::GenomicFeature;
    use crate::scoring::FeatureTable;
    use std::collections::HashMap;

    /// Answers per gene (feature name) and metric kind, 0.0 otherwise
    struct StubSource {
        scores: HashMap<(String, MetricKind), f32>,
    }

    impl StubSource {
        fn new(entries: &[(&str, MetricKind, f32)]) -> Self {
            Self {
                scores: entries
                    .iter()
                    .map(|(gene, kind, v)| ((gene.to_string(), *kind), *v))
                    .collect(),
            }
        }
    }

    impl MeasurementSource for StubSource {
        fn region_score(
            &self,
            feature: &GenomicFeature,
            _zoom: i32,
            kind: MetricKind,
            _frame: Option<&str>,
        ) -> f32 {
            self.scores
                .get(&(feature.name.clone(), kind))
                .copied()
                .unwrap_or(0.0)
        }
    }

    fn table() -> FeatureTable {
        let mut table = FeatureTable::new();
        table.extend([
            GenomicFeature::new("EGFR", "chr7", 55_086_725, 55_275_031),
            GenomicFeature::new("BRCA1", "chr17", 41_196_312, 41_277_500),
        ]);
        table
    }

    fn doc() -> Document {
        let mut doc = Document::new();
        doc.graph.nodes.push(Node::labeled("1", "EGFR"));
        doc.graph.nodes.push(Node::labeled("2", "BRCA1"));
        doc.graph.nodes.push(Node::labeled("3", "UNMAPPED"));
        doc.graph.nodes.push(Node::new("4"));
        doc
    }

    fn source() -> StubSource {
        StubSource::new(&[
            ("EGFR", MetricKind::MutationCount, 3.0),
            ("EGFR", MetricKind::Amplification, 2.0),
        ])
    }

    #[test]
    fn test_unaltered_nodes_skipped() {
        let config = AnnotatorConfig::default();
        let table = table();
        let src = source();
        let mut doc = doc();

        let summary =
            Annotator::new(&table, &config).annotate(&mut doc, &[&src], &["PERCENT_MUTATED"]);

        assert_eq!(doc.graph.nodes[0].key_data("PERCENT_MUTATED"), Some("1.0"));
        assert_eq!(doc.graph.nodes[1].key_data("PERCENT_MUTATED"), None);
        assert_eq!(
            summary,
            AnnotationSummary {
                nodes_visited: 4,
                nodes_without_label: 1,
                entries_written: 1,
                no_data: 1,
                unaltered_skipped: 1,
                unknown_metrics: 0,
            }
        );
    }

    #[test]
    fn test_diagnostic_mode_writes_zero() {
        let config = AnnotatorConfig::default().with_diagnostic_mode(true);
        let table = table();
        let src = source();
        let mut doc = doc();

        Annotator::new(&table, &config).annotate(&mut doc, &[&src], &["PERCENT_MUTATED"]);
        assert_eq!(doc.graph.nodes[1].key_data("PERCENT_MUTATED"), Some("0.0"));
        // no features, no data, even in diagnostic mode
        assert_eq!(doc.graph.nodes[2].key_data("PERCENT_MUTATED"), None);
    }

    #[test]
    fn test_schema_keys_registered_for_every_metric() {
        let config = AnnotatorConfig::default();
        let table = table();
        let src = source();
        let mut doc = doc();

        Annotator::new(&table, &config).annotate_all(&mut doc, &[&src]);

        let ids: Vec<&str> = doc.keys.iter().map(|k| k.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "PERCENT_MUTATED",
                "PERCENT_CNA_AMPLIFIED",
                "PERCENT_CNA_HOMOZYGOUSLY_DELETED"
            ]
        );
        for key in &doc.keys {
            assert_eq!(key.display_name, key.id);
            assert_eq!(key.data_type, DataType::Float);
            assert_eq!(key.scope, Some(KeyScope::Node));
        }
        // deletion never altered, so no node carries it
        assert!(doc
            .nodes()
            .iter()
            .all(|n| n.key_data("PERCENT_CNA_HOMOZYGOUSLY_DELETED").is_none()));
        assert_eq!(doc.graph.nodes[0].key_data("PERCENT_CNA_AMPLIFIED"), Some("1.0"));
    }

    #[test]
    fn test_repeat_append_duplicates() {
        let config = AnnotatorConfig::default();
        let table = table();
        let src = source();
        let mut doc = doc();
        let annotator = Annotator::new(&table, &config);

        annotator.annotate(&mut doc, &[&src], &["PERCENT_MUTATED"]);
        annotator.annotate(&mut doc, &[&src], &["PERCENT_MUTATED"]);

        assert_eq!(doc.keys.len(), 2);
        let egfr = &doc.graph.nodes[0];
        assert_eq!(
            egfr.data.iter().filter(|d| d.key == "PERCENT_MUTATED").count(),
            2
        );
    }

    #[test]
    fn test_repeat_replace_keeps_single_entry() {
        let config = AnnotatorConfig::default().with_repeat_policy(RepeatPolicy::Replace);
        let table = table();
        let src = source();
        let mut doc = doc();
        let annotator = Annotator::new(&table, &config);

        annotator.annotate(&mut doc, &[&src], &["PERCENT_MUTATED"]);
        annotator.annotate(&mut doc, &[&src], &["PERCENT_MUTATED"]);

        assert_eq!(doc.keys.len(), 1);
        let egfr = &doc.graph.nodes[0];
        assert_eq!(
            egfr.data.iter().filter(|d| d.key == "PERCENT_MUTATED").count(),
            1
        );
        assert_eq!(egfr.label(), Some("EGFR"));
    }

    #[test]
    fn test_unknown_metric() {
        let config = AnnotatorConfig::default();
        let table = table();
        let src = source();
        let mut doc = doc();

        let summary =
            Annotator::new(&table, &config).annotate(&mut doc, &[&src], &["EXPRESSION_Z"]);

        assert_eq!(summary.unknown_metrics, 1);
        assert_eq!(summary.entries_written, 0);
        assert!(doc.key("EXPRESSION_Z").is_some());
        assert!(doc.nodes().iter().all(|n| n.key_data("EXPRESSION_Z").is_none()));
    }

    #[test]
    fn test_custom_metric_binding() {
        let config = AnnotatorConfig::default().with_metric("EGFR_AMP", MetricKind::Amplification);
        let table = table();
        let src = source();
        let mut doc = doc();

        Annotator::new(&table, &config).annotate(&mut doc, &[&src], &["EGFR_AMP"]);
        assert_eq!(doc.graph.nodes[0].key_data("egfr_amp"), Some("1.0"));
    }

    #[test]
    fn test_average_scores_recorded() {
        let mut config = AnnotatorConfig::default();
        config.record_average_scores = true;
        let table = table();
        let src = source();
        let mut doc = doc();

        let summary =
            Annotator::new(&table, &config).annotate(&mut doc, &[&src], &["PERCENT_MUTATED"]);

        let egfr = &doc.graph.nodes[0];
        assert_eq!(egfr.key_data("PERCENT_MUTATED_AVERAGE"), Some("3.0"));
        assert_eq!(summary.entries_written, 2);
        assert!(doc.key("PERCENT_MUTATED_AVERAGE").is_some());
    }

    #[test]
    fn test_no_sources_writes_nothing() {
        let config = AnnotatorConfig::default().with_diagnostic_mode(true);
        let table = table();
        let mut doc = doc();

        let summary = Annotator::new(&table, &config).annotate_all(&mut doc, &[]);
        assert_eq!(summary.entries_written, 0);
        assert_eq!(summary.no_data, 9);
        assert_eq!(doc.keys.len(), 3);
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(0.0), "0.0");
        assert_eq!(format_score(0.75), "0.75");
        assert_eq!(format_score(1.0), "1.0");
        assert_eq!(format_score(0.5), "0.5");
        assert_eq!(format_score(0.001), "0.001");
        assert_eq!(format_score(-0.0), "-0.0");
    }

    #[test]
    fn test_format_score_exponent_form() {
        assert_eq!(format_score(1.0 / 2000.0), "5.0E-4");
        assert_eq!(format_score(1.25e-5), "1.25E-5");
        assert_eq!(format_score(-2.5e-4), "-2.5E-4");
        assert_eq!(format_score(1.0e7), "1.0E7");
        assert_eq!(format_score(9_999_999.0), "9999999.0");
        assert_eq!(format_score(f32::NAN), "NaN");
        assert_eq!(format_score(f32::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_nested_graph_nodes_are_annotated() {
        let config = AnnotatorConfig::default();
        let table = table();
        let src = source();
        let mut doc = Document::new();
        let mut outer = Node::labeled("1", "BRCA1");
        let mut inner = crate::graph::Graph::new();
        inner.nodes.push(Node::labeled("1.1", "EGFR"));
        outer.subgraph = Some(Box::new(inner));
        doc.graph.nodes.push(outer);

        let summary =
            Annotator::new(&table, &config).annotate(&mut doc, &[&src], &["PERCENT_MUTATED"]);

        assert_eq!(summary.nodes_visited, 2);
        assert_eq!(summary.entries_written, 1);
        let nested = &doc.nodes()[0].subgraph.as_deref().expect("nested graph").nodes[0];
        assert_eq!(nested.key_data("PERCENT_MUTATED"), Some("1.0"));
    }
}
