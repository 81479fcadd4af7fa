//! Type and field definitions
//!
//! A type (`ObjType`) names an entity kind and lists its fields in the order
//! they are serialized. Definitions are immutable once registered.

use std::borrow::Cow;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::valve::Chain;

/// Conversion applied to a field value that arrived as a string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoercionKind {
    /// `"true"`/`"1"` and `"false"`/`"0"` become booleans
    Boolean,
    /// Integer or decimal text becomes a number
    Number,
}

impl CoercionKind {
    /// Coerce `text`, or return `None` when it does not parse.
    pub fn coerce(&self, text: &str) -> Option<Value> {
        match self {
            CoercionKind::Boolean => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            CoercionKind::Number => {
                let text = text.trim();
                if let Ok(int) = text.parse::<i64>() {
                    return Some(Value::from(int));
                }
                text.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            }
        }
    }

    /// Coerce a string value in place; other values pass through.
    pub fn coerce_value(&self, value: Value) -> Value {
        match &value {
            Value::String(text) => self.coerce(text).unwrap_or(value),
            _ => value,
        }
    }
}

/// One named slot of a type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Field {
    /// Destination key in serialized form
    pub name: String,
    /// Key read from the live source object (defaults to `name`)
    #[serde(default, rename = "src", skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    /// Element name for a scalar value (defaults to `name`)
    #[serde(default, rename = "singular", skip_serializing_if = "Option::is_none")]
    pub singular_label: Option<String>,
    /// Element name for an array value (defaults to `name`)
    #[serde(default, rename = "plural", skip_serializing_if = "Option::is_none")]
    pub plural_label: Option<String>,
    /// Render as an XML attribute of the parent element
    #[serde(default, rename = "attribute")]
    pub is_attribute: bool,
    /// Wire label -> internal value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumerated: Option<IndexMap<String, Value>>,
    /// Coercion for values that arrive as strings
    #[serde(default, rename = "coerce_to", skip_serializing_if = "Option::is_none")]
    pub coercion: Option<CoercionKind>,
    /// Output contexts this field is omitted from
    #[serde(default, rename = "filter_from", skip_serializing_if = "Vec::is_empty")]
    pub exclude_from_contexts: Vec<String>,
    /// Documentation only
    #[serde(default, rename = "desc", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Explicit validation chain used by the schema translator
    #[serde(skip)]
    pub validation: Option<Chain>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn source(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }

    pub fn singular(mut self, label: impl Into<String>) -> Self {
        self.singular_label = Some(label.into());
        self
    }

    pub fn plural(mut self, label: impl Into<String>) -> Self {
        self.plural_label = Some(label.into());
        self
    }

    pub fn attribute(mut self) -> Self {
        self.is_attribute = true;
        self
    }

    /// Set the label -> internal value map. Labels keep their given order.
    pub fn enumerated<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.enumerated = Some(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn coerce_to(mut self, kind: CoercionKind) -> Self {
        self.coercion = Some(kind);
        self
    }

    pub fn filter_from<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_from_contexts = contexts.into_iter().map(Into::into).collect();
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn validate(mut self, chain: Chain) -> Self {
        self.validation = Some(chain);
        self
    }

    /// Key read from the source object.
    pub fn source_key(&self) -> &str {
        self.source_key.as_deref().unwrap_or(&self.name)
    }

    /// True when the source key differs from the wire name.
    pub fn has_distinct_source(&self) -> bool {
        self.source_key() != self.name
    }

    pub fn singular_label(&self) -> &str {
        self.singular_label.as_deref().unwrap_or(&self.name)
    }

    pub fn plural_label(&self) -> &str {
        self.plural_label.as_deref().unwrap_or(&self.name)
    }

    /// Whether the field is omitted from output for `context`.
    pub fn is_excluded_from(&self, context: Option<&str>) -> bool {
        match context {
            Some(context) => self.exclude_from_contexts.iter().any(|c| c == context),
            None => false,
        }
    }

    /// Internal value -> wire label. `None` when nothing matches.
    pub fn enumerated_label(&self, internal: &Value) -> Option<&str> {
        self.enumerated
            .as_ref()?
            .iter()
            .find(|(_, value)| *value == internal)
            .map(|(label, _)| label.as_str())
    }
}

/// A named entity kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjType {
    /// Unique key into the registry
    pub name: String,
    /// Element name for a single instance
    #[serde(default, rename = "singular", skip_serializing_if = "Option::is_none")]
    pub singular_label: Option<String>,
    /// Element name wrapping a root-level sequence of instances
    #[serde(default, rename = "plural", skip_serializing_if = "Option::is_none")]
    pub plural_label: Option<String>,
    /// Fields in serialization order
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl ObjType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn singular(mut self, label: impl Into<String>) -> Self {
        self.singular_label = Some(label.into());
        self
    }

    pub fn plural(mut self, label: impl Into<String>) -> Self {
        self.plural_label = Some(label.into());
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Singular label, defaulting to the name with a lowercased first letter.
    pub fn singular_label(&self) -> Cow<'_, str> {
        match &self.singular_label {
            Some(label) => Cow::Borrowed(label),
            None => {
                let mut chars = self.name.chars();
                match chars.next() {
                    Some(first) => Cow::Owned(first.to_lowercase().chain(chars).collect()),
                    None => Cow::Borrowed(""),
                }
            }
        }
    }

    /// Plural label, defaulting to the singular label.
    pub fn plural_label(&self) -> Cow<'_, str> {
        match &self.plural_label {
            Some(label) => Cow::Borrowed(label),
            None => self.singular_label(),
        }
    }

    /// Looks up a field by its wire name.
    pub fn field_named(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
