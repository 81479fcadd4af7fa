//! Schema translation
//!
//! Derives one `ValidationSchema` per registered type so inbound payloads can
//! be checked against the same definitions used for serialization. Payloads
//! are expressed in source-object vocabulary: a field read from a distinct
//! source key is optional on input and its cleaned value is written under
//! that source key.
//!
//! Types may reference each other freely; the registry holds no type links,
//! so no cycle check is needed here.

use indexmap::IndexMap;

use crate::registry::{Field, TypeRegistry};
use crate::valve::{Chain, ValidationSchema};

/// Builds the validation chain for one field.
pub fn field_chain(field: &Field) -> Chain {
    let chain = match (&field.validation, &field.enumerated) {
        (Some(chain), _) => chain.clone(),
        (None, Some(map)) => Chain::new().enumerated_map(map.clone()),
        (None, None) => Chain::new(),
    };

    if field.has_distinct_source() {
        chain.optional().rename(field.source_key())
    } else {
        chain
    }
}

/// Type name -> validation schema, in registry order.
pub fn derive_validation_schema(registry: &TypeRegistry) -> IndexMap<String, ValidationSchema> {
    registry
        .types()
        .map(|ty| {
            let schema = ty
                .fields
                .iter()
                .fold(ValidationSchema::new(), |schema, field| {
                    schema.key(field.name.clone(), field_chain(field))
                });
            (ty.name.clone(), schema)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ObjType;
    use crate::valve::{SchemaEntry, Valve};
    use serde_json::json;

    fn registry() -> TypeRegistry {
        TypeRegistry::define([
            ObjType::new("Node")
                .plural("nodes")
                .field(
                    Field::new("id")
                        .source("hash_id")
                        .attribute()
                        .validate(Chain::new().is_string()),
                )
                .field(Field::new("is_active").source("active").validate(Chain::new().to_boolean()))
                .field(Field::new("agent_name").validate(Chain::new().is_string().not_empty()))
                .field(Field::new("state").enumerated([("inactive", 0), ("active", 1)]))
                .field(Field::new("data")),
        ])
        .unwrap()
    }

    fn chain_for<'a>(schema: &'a ValidationSchema, key: &str) -> &'a Chain {
        match schema.get(key) {
            Some(SchemaEntry::Chain(chain)) => chain,
            _ => panic!("no chain for {}", key),
        }
    }

    #[test]
    fn test_one_schema_per_type() {
        let schemas = derive_validation_schema(&registry());
        assert_eq!(schemas.len(), 1);
        let node = &schemas["Node"];
        let keys: Vec<_> = node.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["id", "is_active", "agent_name", "state", "data"]);
    }

    #[test]
    fn test_distinct_source_is_optional_and_renamed() {
        let schemas = derive_validation_schema(&registry());
        let id = chain_for(&schemas["Node"], "id");

        assert!(id.is_optional());
        assert_eq!(id.rename_target(), Some("hash_id"));
        assert!(id.has_validator("is_string"));

        let agent = chain_for(&schemas["Node"], "agent_name");
        assert!(!agent.is_optional());
        assert!(agent.rename_target().is_none());
    }

    #[test]
    fn test_enumerated_and_empty_chains() {
        let schemas = derive_validation_schema(&registry());
        assert!(chain_for(&schemas["Node"], "state").has_validator("enumerated"));
        assert!(chain_for(&schemas["Node"], "data").is_empty());
    }

    #[tokio::test]
    async fn test_translated_schema_checks_payloads() {
        let schemas = derive_validation_schema(&registry());
        let valve = Valve::new(schemas["Node"].clone());

        let cleaned = valve
            .check(&json!({
                "id": "xkcd",
                "is_active": "false",
                "agent_name": "gl<ah",
                "state": "active",
                "data": {"foo": "bar"}
            }))
            .await
            .unwrap();

        assert_eq!(
            cleaned,
            json!({
                "hash_id": "xkcd",
                "active": false,
                "agent_name": "gl<ah",
                "state": 1,
                "data": {"foo": "bar"}
            })
        );
    }
}
