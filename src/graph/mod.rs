//! GraphML document model
//!
//! Ordered nodes with ordered `<data>` children, document-level `<key>`
//! declarations, and case-insensitive child lookup. Nodes may hold a nested
//! graph, and markup the model does not interpret is kept in place.

pub mod document;
pub mod layout;
pub mod schema;
pub mod store_models;
pub mod traits;

pub use document::{Document, Graph, GRAPHML_NS};
pub use layout::Slot;
pub use schema::{DataType, KeyScope, SchemaKey, UnknownValue};
pub use store_models::{DataEntry, Edge, Node, KEY, LABEL};

pub use traits::{eq_ignore_case, find_child_text, Element};
