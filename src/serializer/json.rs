//! JSON emitter and parser

use serde_json::{Map, Value};

use super::errors::{SerializeError, SerializeResult};
use super::node::Node;
use super::options::{Format, SerializerOptions};
use crate::registry::TypeRegistry;

/// Render a tree to a JSON value, applying context filtering and null
/// stripping.
pub fn to_value(node: &Node, registry: &TypeRegistry, options: &SerializerOptions) -> Value {
    match node {
        Node::Scalar(value) => value.clone(),
        Node::Seq(items) => Value::Array(
            items
                .iter()
                .map(|item| to_value(item, registry, options))
                .collect(),
        ),
        Node::Map(entries) => Value::Object(render_entries(
            entries.iter().map(|(k, v)| (k, v)),
            registry,
            options,
        )),
        Node::Typed { type_name, fields } => {
            let def = registry.get(type_name);
            let visible = fields.iter().filter(|(name, _)| {
                def.and_then(|def| def.field_named(name))
                    .map_or(true, |field| !field.is_excluded_from(options.context()))
            });
            Value::Object(render_entries(visible.map(|(k, v)| (k, v)), registry, options))
        }
    }
}

fn render_entries<'a>(
    entries: impl Iterator<Item = (&'a String, &'a Node)>,
    registry: &TypeRegistry,
    options: &SerializerOptions,
) -> Map<String, Value> {
    entries
        .filter(|(_, node)| !(options.strip_nulls && node.is_null()))
        .map(|(key, node)| (key.clone(), to_value(node, registry, options)))
        .collect()
}

pub fn emit(node: &Node, registry: &TypeRegistry, options: &SerializerOptions) -> SerializeResult<String> {
    let value = to_value(node, registry, options);
    let text = if options.pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };
    text.map_err(|e| SerializeError::emit(Format::Json, e))
}

/// JSON text keeps its own structure; parsing only has to be well-formed.
pub fn parse(text: &str) -> SerializeResult<Value> {
    serde_json::from_str(text).map_err(|e| SerializeError::malformed(Format::Json, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Field, ObjType};
    use serde_json::json;

    fn registry() -> TypeRegistry {
        TypeRegistry::define([ObjType::new("Node")
            .field(Field::new("id"))
            .field(Field::new("state").filter_from(["public"]))
            .field(Field::new("note"))])
        .unwrap()
    }

    fn node() -> Node {
        Node::Typed {
            type_name: "Node".into(),
            fields: vec![
                ("id".into(), Node::Scalar(json!("15245"))),
                ("state".into(), Node::Scalar(json!("active"))),
                ("note".into(), Node::null()),
            ],
        }
    }

    #[test]
    fn test_emit_keeps_field_order_and_nulls() {
        let text = emit(&node(), &registry(), &SerializerOptions::default()).unwrap();
        assert_eq!(text, r#"{"id":"15245","state":"active","note":null}"#);
    }

    #[test]
    fn test_strip_nulls() {
        let options = SerializerOptions::new().strip_nulls();
        let text = emit(&node(), &registry(), &options).unwrap();
        assert_eq!(text, r#"{"id":"15245","state":"active"}"#);
    }

    #[test]
    fn test_context_filtering() {
        let options = SerializerOptions::for_context("public");
        let value = to_value(&node(), &registry(), &options);
        assert_eq!(value, json!({"id": "15245", "note": null}));
    }

    #[test]
    fn test_root_sequence_is_a_native_array() {
        let tree = Node::Seq(vec![node(), node()]);
        let value = to_value(&tree, &registry(), &SerializerOptions::new().strip_nulls());
        assert_eq!(
            value,
            json!([
                {"id": "15245", "state": "active"},
                {"id": "15245", "state": "active"}
            ])
        );
    }

    #[test]
    fn test_parse_rejects_malformed_text() {
        assert_eq!(parse(r#"{"a": [1]}"#).unwrap(), json!({"a": [1]}));
        let err = parse("{\"a\": ").unwrap_err();
        assert!(matches!(err, SerializeError::Malformed { format: Format::Json, .. }));
    }
}
