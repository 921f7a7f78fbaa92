//! In-memory GraphML document
//!
//! A `Document` owns the schema declarations and exactly one root `Graph`.
//! It is mutated in place by annotation and filtering and has a single owner
//! at a time. Nodes of nested graphs count as nodes of the document.

use super::layout::{retain_kind, Slot};
use super::schema::SchemaKey;
use super::store_models::{DataEntry, Edge, Node};
use super::traits::find_child_text;

/// Default namespace written on the root element of new documents
pub const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";

/// A `<graph>` element, either the root graph or one nested in a node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    /// Attributes of the `<graph>` element (`id`, `edgedefault`, ...)
    pub attributes: Vec<(String, String)>,
    /// Graph-level `<data>` children
    pub data: Vec<DataEntry>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub layout: Vec<Slot>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Remove a node by id; edges are left untouched
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let idx = self.nodes.iter().position(|n| n.id == id)?;
        let keep: Vec<bool> = (0..self.nodes.len()).map(|i| i != idx).collect();
        retain_kind(&mut self.layout, &Slot::Node, &keep);
        Some(self.nodes.remove(idx))
    }

    /// Visit every node, each before the nodes of its nested graph
    pub fn visit_nodes<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a Node),
    {
        for node in &self.nodes {
            f(node);
            if let Some(sub) = &node.subgraph {
                sub.visit_nodes(f);
            }
        }
    }

    /// Mutable counterpart of [`Graph::visit_nodes`]
    pub fn visit_nodes_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Node),
    {
        for node in &mut self.nodes {
            f(node);
            if let Some(sub) = node.subgraph.as_deref_mut() {
                sub.visit_nodes_mut(f);
            }
        }
    }

    /// Apply verdicts in visit order. Nested graphs of dropped nodes still
    /// consume their verdicts.
    fn retain_nodes(&mut self, verdicts: &mut impl Iterator<Item = bool>) {
        let mut keep = Vec::with_capacity(self.nodes.len());
        for node in &mut self.nodes {
            keep.push(verdicts.next().unwrap_or(true));
            if let Some(sub) = node.subgraph.as_deref_mut() {
                sub.retain_nodes(verdicts);
            }
        }
        retain_kind(&mut self.layout, &Slot::Node, &keep);
        let mut flags = keep.into_iter();
        self.nodes.retain(|_| flags.next().unwrap_or(true));
    }
}

/// A GraphML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Attributes of the root `<graphml>` element
    pub root_attributes: Vec<(String, String)>,
    /// `<key>` declarations in document order
    pub keys: Vec<SchemaKey>,
    pub graph: Graph,
    /// Order of keys, the graph and unmodelled markup under the root
    pub layout: Vec<Slot>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document carrying the GraphML namespace
    pub fn new() -> Self {
        Self {
            root_attributes: vec![("xmlns".to_string(), GRAPHML_NS.to_string())],
            keys: Vec::new(),
            graph: Graph::new(),
            layout: Vec::new(),
        }
    }

    /// Nodes of the root graph
    pub fn nodes(&self) -> &[Node] {
        &self.graph.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.graph.nodes
    }

    /// Every node, nested graphs included, in document order
    pub fn all_nodes(&self) -> Vec<&Node> {
        let mut nodes = Vec::new();
        self.graph.visit_nodes(&mut |n| nodes.push(n));
        nodes
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.graph.visit_nodes(&mut |_| count += 1);
        count
    }

    /// Labels of all nodes, in document order
    pub fn labels(&self) -> Vec<Option<&str>> {
        self.all_nodes().into_iter().map(Node::label).collect()
    }

    /// Append a schema declaration, even if one with the same id exists
    pub fn push_key(&mut self, key: SchemaKey) {
        self.keys.push(key);
    }

    /// Replace the declaration with the same id in place, or append it
    pub fn upsert_key(&mut self, key: SchemaKey) {
        match self.keys.iter_mut().find(|k| k.id == key.id) {
            Some(existing) => *existing = key,
            None => self.keys.push(key),
        }
    }

    pub fn key(&self, id: &str) -> Option<&SchemaKey> {
        self.keys.iter().find(|k| k.id == id)
    }

    /// Lookup over the schema declarations, e.g. `schema_attr_value("id", "PERCENT_MUTATED")`.
    ///
    /// Keys have no text content, so a hit yields `Some("")`.
    pub fn schema_attr_value(&self, attr_name: &str, attr_value: &str) -> Option<&str> {
        find_child_text(&self.keys, attr_name, attr_value)
    }

    /// Remove every node for which `keep` returns false and return how many went.
    ///
    /// `keep` sees each original node exactly once, nested ones included:
    /// all verdicts are taken before anything is removed. Removing a node
    /// removes its nested graph too; those nodes are not counted.
    pub fn filter_nodes<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Node) -> bool,
    {
        let before = self.node_count();
        let mut verdicts = Vec::with_capacity(before);
        self.graph.visit_nodes(&mut |n| verdicts.push(keep(n)));
        let rejected = verdicts.iter().filter(|k| !**k).count();
        if rejected == 0 {
            return 0;
        }

        self.graph.retain_nodes(&mut verdicts.into_iter());
        let after = self.node_count();

        tracing::debug!("Filtered {} of {} nodes", before - after, before);
        before - after
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DataType, KeyScope};

    fn sample() -> Document {
        let mut doc = Document::new();
        for (id, label) in [("1", "EGFR"), ("2", "BRCA1"), ("3", "JUN"), ("4", "TP53")] {
            doc.graph.nodes.push(Node::labeled(id, label));
        }
        doc.graph.edges.push(Edge::new("1", "2"));
        doc
    }

    #[test]
    fn test_filter_removes_failing_nodes() {
        let mut doc = sample();
        let removed = doc.filter_nodes(|n| {
            n.id.parse::<i32>()
                .map(|i| i % 2 == 0)
                .unwrap_or(false)
        });
        assert_eq!(removed, 2);
        assert_eq!(doc.node_count(), 2);
        assert_eq!(doc.labels(), vec![Some("BRCA1"), Some("TP53")]);
        // Edges are left alone
        assert_eq!(doc.graph.edges.len(), 1);
    }

    #[test]
    fn test_filter_evaluates_each_node_once() {
        let mut doc = sample();
        let mut seen = Vec::new();
        let removed = doc.filter_nodes(|n| {
            seen.push(n.id.clone());
            false
        });
        assert_eq!(removed, 4);
        assert_eq!(seen, vec!["1", "2", "3", "4"]);
        assert_eq!(doc.node_count(), 0);
    }

    #[test]
    fn test_filter_keep_all() {
        let mut doc = sample();
        assert_eq!(doc.filter_nodes(|_| true), 0);
        assert_eq!(doc.node_count(), 4);
    }

    #[test]
    fn test_schema_lookup() {
        let mut doc = sample();
        doc.push_key(
            SchemaKey::new("PERCENT_MUTATED", DataType::Float).with_scope(KeyScope::Node),
        );
        assert_eq!(doc.schema_attr_value("id", "percent_mutated"), Some(""));
        assert_eq!(doc.schema_attr_value("id", "PERCENT_CNA_AMPLIFIED"), None);
        assert_eq!(doc.schema_attr_value("for", "node"), Some(""));
    }

    #[test]
    fn test_upsert_key_replaces_in_place() {
        let mut doc = Document::new();
        doc.push_key(SchemaKey::new("a", DataType::String));
        doc.push_key(SchemaKey::new("b", DataType::String));
        doc.upsert_key(SchemaKey::new("a", DataType::Float));
        assert_eq!(doc.keys.len(), 2);
        assert_eq!(doc.keys[0].data_type, DataType::Float);
        doc.upsert_key(SchemaKey::new("c", DataType::Float));
        assert_eq!(doc.keys.len(), 3);
    }

    #[test]
    fn test_remove_node() {
        let mut doc = sample();
        assert_eq!(doc.graph.remove_node("3").map(|n| n.id), Some("3".to_string()));
        assert!(doc.graph.remove_node("3").is_none());
        assert!(doc.graph.node("1").is_some());
    }

    fn nested() -> Document {
        let mut doc = sample();
        let mut inner = Graph::new();
        inner.nodes.push(Node::labeled("5", "MDM2"));
        inner.nodes.push(Node::labeled("6", "CHEK2"));
        doc.graph.nodes[1].subgraph = Some(Box::new(inner));
        doc
    }

    #[test]
    fn test_nested_nodes_are_counted() {
        let doc = nested();
        assert_eq!(doc.nodes().len(), 4);
        assert_eq!(doc.node_count(), 6);
        assert_eq!(
            doc.labels(),
            vec![
                Some("EGFR"),
                Some("BRCA1"),
                Some("MDM2"),
                Some("CHEK2"),
                Some("JUN"),
                Some("TP53")
            ]
        );
    }

    #[test]
    fn test_filter_reaches_nested_graphs() {
        let mut doc = nested();
        let mut seen = Vec::new();
        let removed = doc.filter_nodes(|n| {
            seen.push(n.id.clone());
            n.id != "6"
        });
        assert_eq!(seen, vec!["1", "2", "5", "6", "3", "4"]);
        assert_eq!(removed, 1);
        let inner = doc.graph.nodes[1].subgraph.as_deref().expect("nested graph");
        assert_eq!(inner.nodes.len(), 1);

        // Dropping the owner takes the nested graph with it
        assert_eq!(doc.filter_nodes(|n| n.id != "2"), 2);
        assert_eq!(doc.node_count(), 3);
    }

    #[test]
    fn test_remove_node_drops_its_slot() {
        let mut doc = sample();
        doc.graph.layout = vec![
            Slot::Node,
            Slot::Edge,
            Slot::Node,
            Slot::Node,
            Slot::Node,
        ];
        doc.graph.remove_node("2");
        assert_eq!(
            doc.graph.layout,
            vec![Slot::Node, Slot::Edge, Slot::Node, Slot::Node]
        );
    }
}
