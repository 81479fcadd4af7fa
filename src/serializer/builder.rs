//! Object builder
//!
//! Walks a live value against the type registry and produces a `Node` tree.
//! Lazy values are awaited, sequence elements and typed-object fields are
//! built concurrently, and results are reassembled in input order. The first
//! failure aborts the whole build.

use std::sync::Arc;

use futures_util::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::Value;

use super::errors::{SerializeError, SerializeResult};
use super::live::{LiveValue, Serializable};
use super::node::Node;
use crate::registry::{Field, TypeRegistry};

/// Builds intermediate trees from live values
#[derive(Debug, Clone, Copy)]
pub struct ObjectBuilder<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> ObjectBuilder<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// Build the tree for `value`.
    pub async fn build(&self, value: LiveValue) -> SerializeResult<Node> {
        self.build_value(value).await
    }

    fn build_value(&self, value: LiveValue) -> BoxFuture<'_, SerializeResult<Node>> {
        async move {
            match value {
                LiveValue::Lazy(producer) => {
                    let produced = producer().await.map_err(SerializeError::LazyValue)?;
                    self.build_value(produced).await
                }
                LiveValue::Seq(items) => {
                    let nodes = try_join_all(items.into_iter().map(|item| self.build_value(item)))
                        .await?;
                    Ok(Node::Seq(nodes))
                }
                LiveValue::Typed(object) => self.build_typed(object).await,
                LiveValue::Map(entries) => {
                    let nodes = try_join_all(entries.into_iter().map(|(key, item)| async move {
                        Ok::<_, SerializeError>((key, self.build_value(item).await?))
                    }))
                    .await?;
                    Ok(Node::Map(nodes))
                }
                LiveValue::Null => Ok(Node::null()),
                LiveValue::Bool(b) => Ok(Node::Scalar(Value::Bool(b))),
                LiveValue::Number(n) => Ok(Node::Scalar(Value::Number(n))),
                LiveValue::String(s) => Ok(Node::Scalar(Value::String(s))),
            }
        }
        .boxed()
    }

    async fn build_typed(&self, object: Arc<dyn Serializable>) -> SerializeResult<Node> {
        let def = self.registry.lookup(object.serializer_type())?;

        let fields = try_join_all(def.fields.iter().map(|field| {
            let object = object.clone();
            async move {
                let raw = object.get(field.source_key()).unwrap_or_default();
                let node = self.build_value(raw).await?;
                Ok::<_, SerializeError>((field.name.clone(), finish_field(field, node)))
            }
        }))
        .await?;

        Ok(Node::Typed {
            type_name: def.name.clone(),
            fields,
        })
    }
}

/// Applies enumerated reverse lookup and string coercion to a built field.
fn finish_field(field: &Field, node: Node) -> Node {
    let node = match (&field.enumerated, node) {
        (Some(_), Node::Scalar(value)) => match field.enumerated_label(&value) {
            Some(label) => Node::Scalar(Value::String(label.to_string())),
            None => Node::null(),
        },
        (_, node) => node,
    };

    match (field.coercion, node) {
        (Some(kind), Node::Scalar(value)) => Node::Scalar(kind.coerce_value(value)),
        (_, node) => node,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CoercionKind, ObjType, RegistryError};
    use crate::serializer::TypedObject;
    use serde_json::json;
    use std::time::Duration;

    fn registry() -> TypeRegistry {
        TypeRegistry::define([
            ObjType::new("Node")
                .field(Field::new("id").source("hash_id"))
                .field(Field::new("is_active").source("active").coerce_to(CoercionKind::Boolean))
                .field(Field::new("state").enumerated([("inactive", 0), ("active", 1)]))
                .field(Field::new("opts").source("options")),
            ObjType::new("NodeOpts").field(Field::new("option1").source("opt1")),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_typed_fields_follow_declared_order() {
        let registry = registry();
        let obj = TypedObject::new("Node")
            .with("state", 1i64)
            .with("active", "true")
            .with("hash_id", "15245")
            .with("options", TypedObject::new("NodeOpts").with("opt1", "defaultval"));

        let node = ObjectBuilder::new(&registry).build(obj.into()).await.unwrap();
        assert_eq!(
            node.to_plain(),
            json!({
                "id": "15245",
                "is_active": true,
                "state": "active",
                "opts": {"option1": "defaultval"}
            })
        );
        match node {
            Node::Typed { type_name, fields } => {
                assert_eq!(type_name, "Node");
                let names: Vec<_> = fields.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(names, vec!["id", "is_active", "state", "opts"]);
            }
            other => panic!("expected typed node, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unmatched_enumerated_value_is_absent() {
        let registry = registry();
        let obj = TypedObject::new("Node").with("state", 9i64);

        let node = ObjectBuilder::new(&registry).build(obj.into()).await.unwrap();
        assert_eq!(node.to_plain()["state"], Value::Null);
        assert_eq!(node.to_plain()["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_lazy_values_resolve() {
        let registry = registry();
        let obj = TypedObject::new("Node").with(
            "hash_id",
            LiveValue::lazy(|| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(LiveValue::lazy(|| async { Ok(LiveValue::from("nested")) }))
            }),
        );

        let node = ObjectBuilder::new(&registry).build(obj.into()).await.unwrap();
        assert_eq!(node.to_plain()["id"], json!("nested"));
    }

    #[tokio::test]
    async fn test_sequence_order_survives_out_of_order_completion() {
        let registry = registry();
        let items: Vec<LiveValue> = (0..5u64)
            .map(|i| {
                LiveValue::lazy(move || async move {
                    tokio::time::sleep(Duration::from_millis(25 - i * 5)).await;
                    Ok(LiveValue::from(i))
                })
            })
            .collect();

        let node = ObjectBuilder::new(&registry).build(items.into()).await.unwrap();
        assert_eq!(node.to_plain(), json!([0, 1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn test_failing_element_fails_the_build() {
        let registry = registry();
        let items = vec![
            LiveValue::from("ok"),
            LiveValue::lazy(|| async { Err("backend down".into()) }),
        ];

        let err = ObjectBuilder::new(&registry).build(items.into()).await.unwrap_err();
        assert!(matches!(err, SerializeError::LazyValue(_)));
        assert!(err.to_string().contains("backend down"));
    }

    #[tokio::test]
    async fn test_unknown_type_names_the_type() {
        let registry = registry();
        let err = ObjectBuilder::new(&registry)
            .build(TypedObject::new("Widget").into())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SerializeError::Registry(RegistryError::UnknownType(ref name)) if name == "Widget"
        ));
    }

    #[tokio::test]
    async fn test_plain_maps_keep_their_keys() {
        let registry = registry();
        let node = ObjectBuilder::new(&registry)
            .build(json!({"zeta": 1, "alpha": [true, null]}).into())
            .await
            .unwrap();

        assert_eq!(
            node,
            Node::Map(vec![
                ("zeta".into(), Node::Scalar(json!(1))),
                (
                    "alpha".into(),
                    Node::Seq(vec![Node::Scalar(json!(true)), Node::null()])
                ),
            ])
        );
    }
}
