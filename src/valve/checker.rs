//! Schema checker
//!
//! Applies a `ValidationSchema` to an input object and produces either a
//! cleaned object or the first located error.
//!
//! - Keys are processed in schema order
//! - Keys not named by the schema are dropped
//! - The first failure stops the check
//! - The final validator runs only after every key succeeded

use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::chain::{Baton, Chain};
use super::errors::{CheckResult, ValidationError};
use crate::observability::{log_event_with_fields, Event};

/// Whole-object validator run after all keys pass
pub type FinalValidatorFn =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

/// Schema value for one key
#[derive(Debug, Clone)]
pub enum SchemaEntry {
    Chain(Chain),
    Nested(ValidationSchema),
}

/// Mapping of key -> chain or nested schema, in check order
#[derive(Debug, Clone, Default)]
pub struct ValidationSchema {
    entries: IndexMap<String, SchemaEntry>,
}

impl ValidationSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `key` with `chain`.
    pub fn key(mut self, key: impl Into<String>, chain: Chain) -> Self {
        self.entries.insert(key.into(), SchemaEntry::Chain(chain));
        self
    }

    /// Validate the map under `key` with `schema`.
    pub fn nested(mut self, key: impl Into<String>, schema: ValidationSchema) -> Self {
        self.entries.insert(key.into(), SchemaEntry::Nested(schema));
        self
    }

    pub fn get(&self, key: &str) -> Option<&SchemaEntry> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &SchemaEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Step help per key, recursing into nested schemas.
    pub fn help(&self) -> Value {
        let mut tree = Map::new();
        for (key, entry) in &self.entries {
            let value = match entry {
                SchemaEntry::Chain(chain) => {
                    Value::Array(chain.help().into_iter().map(Value::String).collect())
                }
                SchemaEntry::Nested(schema) => schema.help(),
            };
            tree.insert(key.clone(), value);
        }
        Value::Object(tree)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Full,
    Partial,
}

/// Validates input objects against a schema
#[derive(Clone)]
pub struct Valve {
    schema: ValidationSchema,
    baton: Baton,
    final_validator: Option<FinalValidatorFn>,
}

impl Valve {
    pub fn new(schema: ValidationSchema) -> Self {
        Self {
            schema,
            baton: Baton::empty(),
            final_validator: None,
        }
    }

    /// Context passed to every step of every check.
    pub fn with_baton(mut self, baton: Baton) -> Self {
        self.baton = baton;
        self
    }

    /// Set the whole-object validator. Its output replaces the cleaned object.
    pub fn with_final_validator<F, Fut>(mut self, func: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        self.final_validator = Some(Arc::new(move |value: Value| func(value).boxed()));
        self
    }

    pub fn schema(&self) -> &ValidationSchema {
        &self.schema
    }

    pub fn baton(&self) -> &Baton {
        &self.baton
    }

    /// Every required key must be present.
    pub async fn check(&self, obj: &Value) -> CheckResult<Value> {
        self.run(obj, Mode::Full).await
    }

    /// Absent keys are tolerated unless marked `update_required`; immutable
    /// keys must be absent.
    pub async fn check_partial(&self, obj: &Value) -> CheckResult<Value> {
        self.run(obj, Mode::Partial).await
    }

    /// Help tree for the schema.
    pub fn help(&self) -> Value {
        self.schema.help()
    }

    async fn run(&self, obj: &Value, mode: Mode) -> CheckResult<Value> {
        let result = self.check_all(obj, mode).await;
        if let Err(err) = &result {
            log_event_with_fields(
                Event::CheckRejected,
                &[
                    ("code", err.code().code()),
                    ("key", err.key().unwrap_or("")),
                    ("message", err.message()),
                    ("parent_keys", err.parent_keys().join(".").as_str()),
                ],
            );
        }
        result
    }

    async fn check_all(&self, obj: &Value, mode: Mode) -> CheckResult<Value> {
        let obj = obj
            .as_object()
            .ok_or_else(|| ValidationError::not_a_hash(None, &[]))?;
        let cleaned = self.check_schema(&self.schema, obj, Vec::new(), mode).await?;

        match &self.final_validator {
            Some(final_validator) => {
                final_validator(Value::Object(cleaned)).await.map_err(|message| {
                    log_event_with_fields(Event::FinalValidationRejected, &[("message", message.as_str())]);
                    ValidationError::final_validation(message)
                })
            }
            None => Ok(Value::Object(cleaned)),
        }
    }

    fn check_schema<'a>(
        &'a self,
        schema: &'a ValidationSchema,
        obj: &'a Map<String, Value>,
        parent_keys: Vec<String>,
        mode: Mode,
    ) -> BoxFuture<'a, CheckResult<Map<String, Value>>> {
        async move {
            let mut cleaned = Map::new();

            for (key, entry) in &schema.entries {
                let present = obj.get(key);

                match entry {
                    SchemaEntry::Chain(chain) => {
                        let value = match present {
                            Some(value) => value,
                            None => {
                                let tolerated = chain.is_optional()
                                    || (mode == Mode::Partial && !chain.is_update_required());
                                if tolerated {
                                    continue;
                                }
                                return Err(ValidationError::missing_key(key, &parent_keys));
                            }
                        };

                        if mode == Mode::Partial && chain.is_immutable() {
                            return Err(ValidationError::immutable_key(key, &parent_keys));
                        }

                        let out = chain
                            .run(value.clone(), &self.baton)
                            .await
                            .map_err(|message| {
                                ValidationError::field_invalid(key, &parent_keys, message)
                            })?;
                        let target = chain.rename_target().unwrap_or(key);
                        cleaned.insert(target.to_string(), out);
                    }
                    SchemaEntry::Nested(nested) => {
                        let value = match present {
                            Some(value) => value,
                            None if mode == Mode::Partial => continue,
                            None => return Err(ValidationError::missing_key(key, &parent_keys)),
                        };
                        let inner = value
                            .as_object()
                            .ok_or_else(|| ValidationError::not_a_hash(Some(key), &parent_keys))?;

                        let mut path = parent_keys.clone();
                        path.push(key.clone());
                        let out = self.check_schema(nested, inner, path, mode).await?;
                        cleaned.insert(key.clone(), Value::Object(out));
                    }
                }
            }

            Ok(cleaned)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valve::ValidationErrorCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_extra_keys_dropped() {
        let valve = Valve::new(ValidationSchema::new().key("a", Chain::new().is_int()));
        let cleaned = valve.check(&json!({"a": 1, "b": 2})).await.unwrap();
        assert_eq!(cleaned, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_invalid_integer() {
        let valve = Valve::new(ValidationSchema::new().key("a", Chain::new().is_int()));
        let err = valve.check(&json!({"a": "x"})).await.unwrap_err();
        assert_eq!(err.message(), "Invalid integer");
        assert_eq!(err.key(), Some("a"));
        assert!(err.parent_keys().is_empty());
    }

    #[tokio::test]
    async fn test_nested_error_carries_path() {
        let valve = Valve::new(
            ValidationSchema::new().nested(
                "a",
                ValidationSchema::new().key("b", Chain::new().range(1, 65535)),
            ),
        );

        let err = valve.check(&json!({"a": {"b": 65536}})).await.unwrap_err();
        assert_eq!(err.message(), "Value out of range (1..65535)");
        assert_eq!(err.key(), Some("b"));
        assert_eq!(err.parent_keys(), &["a".to_string()]);

        let cleaned = valve.check(&json!({"a": {"b": 22, "c": 1}})).await.unwrap();
        assert_eq!(cleaned, json!({"a": {"b": 22}}));
    }

    #[tokio::test]
    async fn test_nested_requires_a_map() {
        let valve = Valve::new(
            ValidationSchema::new().nested("a", ValidationSchema::new().key("b", Chain::new())),
        );

        let err = valve.check(&json!({"a": 5})).await.unwrap_err();
        assert_eq!(err.code(), ValidationErrorCode::Structural);
        assert_eq!(err.message(), "Not a hash");

        let err = valve.check(&json!({})).await.unwrap_err();
        assert_eq!(err.message(), "Missing required key (a)");

        assert_eq!(valve.check_partial(&json!({})).await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_missing_and_optional_keys() {
        let valve = Valve::new(
            ValidationSchema::new()
                .key("a", Chain::new().is_int())
                .key("b", Chain::new().optional().is_int()),
        );

        let err = valve.check(&json!({"b": 1})).await.unwrap_err();
        assert_eq!(err.message(), "Missing required key (a)");
        assert_eq!(err.code(), ValidationErrorCode::MissingKey);

        assert_eq!(valve.check(&json!({"a": 1})).await.unwrap(), json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_partial_presence_rules() {
        let valve = Valve::new(
            ValidationSchema::new()
                .key("a", Chain::new().is_int())
                .key("b", Chain::new().update_required().is_int())
                .key("c", Chain::new().immutable().is_int()),
        );

        assert_eq!(valve.check_partial(&json!({"b": 2})).await.unwrap(), json!({"b": 2}));

        let err = valve.check_partial(&json!({"a": 1})).await.unwrap_err();
        assert_eq!(err.message(), "Missing required key (b)");

        let err = valve
            .check_partial(&json!({"b": 2, "c": 3}))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Attempted to mutate immutable key");
        assert_eq!(err.code(), ValidationErrorCode::ImmutableKey);

        // immutable keys are allowed in a full check
        let cleaned = valve.check(&json!({"a": 1, "b": 2, "c": 3})).await.unwrap();
        assert_eq!(cleaned, json!({"a": 1, "b": 2, "c": 3}));
    }

    #[tokio::test]
    async fn test_rename() {
        let valve = Valve::new(
            ValidationSchema::new().key("id", Chain::new().is_string().rename("hash_id")),
        );
        let cleaned = valve.check(&json!({"id": "xkcd"})).await.unwrap();
        assert_eq!(cleaned, json!({"hash_id": "xkcd"}));
    }

    #[tokio::test]
    async fn test_fails_on_first_key_in_schema_order() {
        let valve = Valve::new(
            ValidationSchema::new()
                .key("b", Chain::new().is_int())
                .key("a", Chain::new().is_string()),
        );

        let err = valve.check(&json!({"a": 1, "b": "x"})).await.unwrap_err();
        assert_eq!(err.key(), Some("b"));
    }

    #[tokio::test]
    async fn test_final_validator() {
        let valve = Valve::new(
            ValidationSchema::new()
                .key("password", Chain::new().is_string())
                .key("confirm", Chain::new().is_string()),
        )
        .with_final_validator(|obj: Value| async move {
            if obj["password"] == obj["confirm"] {
                Ok(json!({"password": obj["password"].clone()}))
            } else {
                Err("Passwords differ".to_string())
            }
        });

        let cleaned = valve
            .check(&json!({"password": "p", "confirm": "p"}))
            .await
            .unwrap();
        assert_eq!(cleaned, json!({"password": "p"}));

        let err = valve
            .check(&json!({"password": "p", "confirm": "q"}))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Passwords differ");
        assert_eq!(err.code(), ValidationErrorCode::FinalValidation);
    }

    #[tokio::test]
    async fn test_final_validator_skipped_on_field_error() {
        let valve = Valve::new(ValidationSchema::new().key("a", Chain::new().is_int()))
            .with_final_validator(|_| async { Err("should not run".to_string()) });

        let err = valve.check(&json!({"a": "x"})).await.unwrap_err();
        assert_eq!(err.message(), "Invalid integer");
    }

    #[tokio::test]
    async fn test_baton_is_threaded() {
        let chain = Chain::new().sync_step("owner", None, |v, baton| {
            match baton.get::<&'static str>() {
                Some(owner) if v.as_str() == Some(*owner) => Ok(v),
                _ => Err("Not the owner".to_string()),
            }
        });
        let valve = Valve::new(ValidationSchema::new().key("owner", chain))
            .with_baton(Baton::new("alice"));

        assert!(valve.check(&json!({"owner": "alice"})).await.is_ok());
        assert_eq!(
            valve.check(&json!({"owner": "bob"})).await.unwrap_err().message(),
            "Not the owner"
        );
    }

    #[tokio::test]
    async fn test_root_must_be_a_map() {
        let valve = Valve::new(ValidationSchema::new());
        let err = valve.check(&json!([1])).await.unwrap_err();
        assert_eq!(err.message(), "Not a hash");
    }

    #[test]
    fn test_help_tree() {
        let valve = Valve::new(
            ValidationSchema::new()
                .key("a", Chain::new().optional().to_int().is_int())
                .key("b", Chain::new().to_boolean())
                .nested("c", ValidationSchema::new().key("d", Chain::new().is_ip())),
        );

        assert_eq!(
            valve.help(),
            json!({
                "a": ["Optional", "Integer"],
                "b": [],
                "c": {"d": ["IP address"]}
            })
        );
    }
}
