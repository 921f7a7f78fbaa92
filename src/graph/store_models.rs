use super::document::Graph;
use super::layout::{retain_kind, Slot};
use super::traits::{eq_ignore_case, find_child_text, Element};

/// Key of the data entry holding a node's display name
pub const LABEL: &str = "label";

/// Attribute that `<data>` children are matched on
pub const KEY: &str = "key";

/// A `<data key="...">value</data>` child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEntry {
    pub key: String,
    /// Text content; for structured data, the non-blank text runs joined
    pub value: String,
    /// Inner XML of data holding child elements. Rendered instead of `value`.
    pub markup: Option<String>,
}

impl DataEntry {
    pub fn new(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
            markup: None,
        }
    }
}

impl Element for DataEntry {
    fn attribute(&self, name: &str) -> Option<&str> {
        (name == KEY).then_some(self.key.as_str())
    }

    fn text(&self) -> &str {
        &self.value
    }
}

/// A node in the network graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    /// Attributes besides `id`, in document order
    pub attributes: Vec<(String, String)>,
    pub data: Vec<DataEntry>,
    /// Graph nested inside this node
    pub subgraph: Option<Box<Graph>>,
    pub layout: Vec<Slot>,
}

impl Node {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            attributes: Vec::new(),
            data: Vec::new(),
            subgraph: None,
            layout: Vec::new(),
        }
    }

    /// Node with a `label` data entry
    pub fn labeled(id: &str, label: &str) -> Self {
        Self::new(id).with_data(LABEL, label)
    }

    pub fn with_data(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.push(DataEntry::new(key, value));
        self
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    /// Append a data entry (duplicate keys are allowed)
    pub fn push_data(&mut self, key: &str, value: impl Into<String>) {
        self.data.push(DataEntry::new(key, value));
    }

    /// Remove every data entry with this key (case-insensitive), returning how many went
    pub fn remove_data(&mut self, key: &str) -> usize {
        let keep: Vec<bool> = self
            .data
            .iter()
            .map(|d| !eq_ignore_case(&d.key, key))
            .collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed > 0 {
            retain_kind(&mut self.layout, &Slot::Data, &keep);
            let mut flags = keep.into_iter();
            self.data.retain(|_| flags.next().unwrap_or(true));
        }
        removed
    }

    /// Text of the first data child whose `attr_name` attribute matches `attr_value`
    pub fn attr_value(&self, attr_name: &str, attr_value: &str) -> Option<&str> {
        find_child_text(&self.data, attr_name, attr_value)
    }

    /// Value of the first data entry with this key (case-insensitive)
    pub fn key_data(&self, key: &str) -> Option<&str> {
        self.attr_value(KEY, key)
    }

    pub fn label(&self) -> Option<&str> {
        self.key_data(LABEL)
    }
}

impl Element for Node {
    fn attribute(&self, name: &str) -> Option<&str> {
        if name == "id" {
            return Some(self.id.as_str());
        }
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn text(&self) -> &str {
        ""
    }
}

/// An edge between two nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    /// Attributes besides `id`, `source` and `target`, in document order
    pub attributes: Vec<(String, String)>,
    pub data: Vec<DataEntry>,
    pub layout: Vec<Slot>,
}

impl Edge {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            id: None,
            source: source.to_string(),
            target: target.to_string(),
            attributes: Vec::new(),
            data: Vec::new(),
            layout: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.push(DataEntry::new(key, value));
        self
    }

    pub fn key_data(&self, key: &str) -> Option<&str> {
        find_child_text(&self.data, KEY, key)
    }
}
