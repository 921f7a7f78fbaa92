//! GraphML schema key declarations
//!
//! A `<key>` element declares an attribute that `<data>` children may carry:
//! its id, a human-readable name, a value type and the element kinds it
//! applies to.

use super::layout::Slot;
use super::traits::Element;
use std::str::FromStr;
use thiserror::Error;

/// Value type of a declared attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Long,
    Integer,
    Float,
    Double,
    Boolean,
    String,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Long => "long",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Boolean => "boolean",
            DataType::String => "string",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {what} '{value}'")]
pub struct UnknownValue {
    pub what: &'static str,
    pub value: String,
}

impl FromStr for DataType {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "long" => Ok(DataType::Long),
            "int" | "integer" => Ok(DataType::Integer),
            "float" => Ok(DataType::Float),
            "double" => Ok(DataType::Double),
            "boolean" | "bool" => Ok(DataType::Boolean),
            "string" => Ok(DataType::String),
            _ => Err(UnknownValue {
                what: "attr.type",
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which elements a key applies to (`for` attribute)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyScope {
    All,
    Graph,
    Node,
    Edge,
}

impl KeyScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyScope::All => "all",
            KeyScope::Graph => "graph",
            KeyScope::Node => "node",
            KeyScope::Edge => "edge",
        }
    }
}

impl FromStr for KeyScope {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(KeyScope::All),
            "graph" => Ok(KeyScope::Graph),
            "node" => Ok(KeyScope::Node),
            "edge" => Ok(KeyScope::Edge),
            _ => Err(UnknownValue {
                what: "key scope",
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for KeyScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document-level `<key>` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaKey {
    pub id: String,
    pub display_name: String,
    pub data_type: DataType,
    pub scope: Option<KeyScope>,
    /// Other attributes (e.g. `yfiles.type`), in document order
    pub attributes: Vec<(String, String)>,
    /// Children such as `<default>` and `<desc>`, kept verbatim
    pub layout: Vec<Slot>,
}

impl SchemaKey {
    /// Key whose display name equals its id
    pub fn new(id: &str, data_type: DataType) -> Self {
        Self {
            id: id.to_string(),
            display_name: id.to_string(),
            data_type,
            scope: None,
            attributes: Vec::new(),
            layout: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = name.to_string();
        self
    }

    pub fn with_scope(mut self, scope: KeyScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

impl Element for SchemaKey {
    fn attribute(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(self.id.as_str()),
            "attr.name" => Some(self.display_name.as_str()),
            "attr.type" => Some(self.data_type.as_str()),
            "for" => self.scope.as_ref().map(KeyScope::as_str),
            _ => self
                .attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
        }
    }

    fn text(&self) -> &str {
        ""
    }
}
