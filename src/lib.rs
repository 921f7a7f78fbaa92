//! Network annotator - per-gene alteration metrics for GraphML networks
//!
//! Loads a gene interaction network, annotates each node with the fraction
//! of samples in which the gene is altered, and writes the network back as
//! GraphML, optionally gzipped and base64-encoded for hand-off to a viewer.
//!
//! # Example
//!
//! ```rust,ignore
//! use network_annotator::{annotate::Annotator, codec, config::AnnotatorConfig, loader};
//!
//! let mut doc = loader::load(&"tp53network.xml".into())?;
//! let config = AnnotatorConfig::default();
//! let summary = Annotator::new(&features, &config).annotate_all(&mut doc, &[&mutations]);
//! let page = codec::HandoffTemplate::bundled().write_temp(&doc)?;
//! ```

pub mod annotate;
pub mod codec;
pub mod config;
pub mod graph;
pub mod loader;
pub mod models;
pub mod scoring;

pub use annotate::{AnnotationSummary, Annotator};
pub use codec::{decode, encode, parse, render, write_file, write_to, DecodeOptions, EncodeOptions};
pub use config::{load_config, AnnotatorConfig, RepeatPolicy};
pub use graph::{DataEntry, Document, Node, SchemaKey};
pub use loader::{load, LoadError, NetworkFetcher, Source};
pub use models::{GenomicFeature, MetricKind, ScoreData};
pub use scoring::{collect_score_data, FeatureResolver, FeatureTable, MeasurementSource};
