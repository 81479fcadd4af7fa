//! Live values handed to the object builder
//!
//! Domain objects implement `Serializable` to expose their type name and
//! source keys. Plain data uses the `Seq`/`Map`/scalar variants, and values
//! that must be computed on demand use `Lazy`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde_json::{Number, Value};

use super::errors::BoxError;

/// A domain object with a registered type
pub trait Serializable: Send + Sync {
    /// Name of the registered type describing this object.
    fn serializer_type(&self) -> &str;

    /// Value stored under `source_key`, or `None` when absent.
    fn get(&self, source_key: &str) -> Option<LiveValue>;
}

/// Producer of a lazily computed value
pub type LazyFn = Arc<dyn Fn() -> BoxFuture<'static, Result<LiveValue, BoxError>> + Send + Sync>;

/// A value as seen by the builder
#[derive(Clone, Default)]
pub enum LiveValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Seq(Vec<LiveValue>),
    Map(IndexMap<String, LiveValue>),
    Typed(Arc<dyn Serializable>),
    Lazy(LazyFn),
}

impl LiveValue {
    /// Wrap an async producer. It is invoked once per build.
    pub fn lazy<F, Fut>(producer: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<LiveValue, BoxError>> + Send + 'static,
    {
        LiveValue::Lazy(Arc::new(move || producer().boxed()))
    }

    pub fn typed<T: Serializable + 'static>(object: T) -> Self {
        LiveValue::Typed(Arc::new(object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, LiveValue::Null)
    }
}

impl fmt::Debug for LiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiveValue::Null => f.write_str("Null"),
            LiveValue::Bool(b) => write!(f, "Bool({})", b),
            LiveValue::Number(n) => write!(f, "Number({})", n),
            LiveValue::String(s) => write!(f, "String({:?})", s),
            LiveValue::Seq(items) => f.debug_tuple("Seq").field(items).finish(),
            LiveValue::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            LiveValue::Typed(obj) => write!(f, "Typed({})", obj.serializer_type()),
            LiveValue::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

impl From<Value> for LiveValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => LiveValue::Null,
            Value::Bool(b) => LiveValue::Bool(b),
            Value::Number(n) => LiveValue::Number(n),
            Value::String(s) => LiveValue::String(s),
            Value::Array(items) => LiveValue::Seq(items.into_iter().map(Into::into).collect()),
            Value::Object(entries) => LiveValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, LiveValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for LiveValue {
    fn from(value: &str) -> Self {
        LiveValue::String(value.to_string())
    }
}

impl From<String> for LiveValue {
    fn from(value: String) -> Self {
        LiveValue::String(value)
    }
}

impl From<bool> for LiveValue {
    fn from(value: bool) -> Self {
        LiveValue::Bool(value)
    }
}

impl From<i64> for LiveValue {
    fn from(value: i64) -> Self {
        LiveValue::Number(value.into())
    }
}

impl From<u64> for LiveValue {
    fn from(value: u64) -> Self {
        LiveValue::Number(value.into())
    }
}

impl From<f64> for LiveValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(LiveValue::Null, LiveValue::Number)
    }
}

impl<T: Into<LiveValue>> From<Vec<T>> for LiveValue {
    fn from(items: Vec<T>) -> Self {
        LiveValue::Seq(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Serializable + 'static> From<Arc<T>> for LiveValue {
    fn from(object: Arc<T>) -> Self {
        LiveValue::Typed(object)
    }
}

/// A general-purpose `Serializable`: a type name plus source-key values
#[derive(Debug, Clone)]
pub struct TypedObject {
    type_name: String,
    values: IndexMap<String, LiveValue>,
}

impl TypedObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            values: IndexMap::new(),
        }
    }

    /// Set the value under `source_key`.
    pub fn with(mut self, source_key: impl Into<String>, value: impl Into<LiveValue>) -> Self {
        self.values.insert(source_key.into(), value.into());
        self
    }

    pub fn set(&mut self, source_key: impl Into<String>, value: impl Into<LiveValue>) {
        self.values.insert(source_key.into(), value.into());
    }
}

impl Serializable for TypedObject {
    fn serializer_type(&self) -> &str {
        &self.type_name
    }

    fn get(&self, source_key: &str) -> Option<LiveValue> {
        self.values.get(source_key).cloned()
    }
}

impl From<TypedObject> for LiveValue {
    fn from(object: TypedObject) -> Self {
        LiveValue::typed(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let live = LiveValue::from(json!({"a": [1, "x", null], "b": true}));
        match live {
            LiveValue::Map(entries) => {
                assert!(matches!(entries["a"], LiveValue::Seq(ref items) if items.len() == 3));
                assert!(matches!(entries["b"], LiveValue::Bool(true)));
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_typed_object_lookup() {
        let obj = TypedObject::new("Node").with("hash_id", "15245").with("active", false);
        assert_eq!(obj.serializer_type(), "Node");
        assert!(matches!(obj.get("hash_id"), Some(LiveValue::String(ref s)) if s == "15245"));
        assert!(obj.get("missing").is_none());
    }

    #[test]
    fn test_debug_hides_closures() {
        let lazy = LiveValue::lazy(|| async { Ok(LiveValue::from("x")) });
        assert_eq!(format!("{:?}", lazy), "Lazy(..)");
        let typed = LiveValue::from(TypedObject::new("Node"));
        assert_eq!(format!("{:?}", typed), "Typed(Node)");
    }
}
