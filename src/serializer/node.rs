//! Intermediate tree
//!
//! The format-neutral result of a build. Both emitters consume it; typed
//! nodes keep their type name so the XML emitter can name elements and
//! place attributes.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Null, boolean, number or string
    Scalar(Value),
    Seq(Vec<Node>),
    /// Plain map, keys as given
    Map(Vec<(String, Node)>),
    /// Instance of a registered type, fields in declared order
    Typed {
        type_name: String,
        fields: Vec<(String, Node)>,
    },
}

impl Node {
    pub fn null() -> Self {
        Node::Scalar(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Value::Null))
    }

    /// Empty sequence or map.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Node::Seq(items) => items.is_empty(),
            Node::Map(entries) => entries.is_empty(),
            _ => false,
        }
    }

    /// Plain-data projection: typed nodes become maps.
    pub fn to_plain(&self) -> Value {
        match self {
            Node::Scalar(value) => value.clone(),
            Node::Seq(items) => Value::Array(items.iter().map(Node::to_plain).collect()),
            Node::Map(entries) | Node::Typed { fields: entries, .. } => Value::Object(
                entries
                    .iter()
                    .map(|(key, node)| (key.clone(), node.to_plain()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}
