//! # Custom Validator Registry
//!
//! Named validators registered once at startup and referenced from chains
//! with `Chain::custom`. The registry is an explicit object passed by
//! reference; entries are never removed.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use futures_util::future::FutureExt;
use serde_json::Value;

use super::chain::{Baton, Step, StepFn};
use super::errors::{ChainError, ChainResult};
use crate::observability::{log_event_with_fields, Event};

const DEFAULT_HELP: &str = "(help not found)";

#[derive(Clone)]
struct CustomValidator {
    description: Option<String>,
    func: StepFn,
}

/// Name -> validator mapping
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: RwLock<HashMap<String, CustomValidator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asynchronous validator.
    ///
    /// `description` becomes the step's help text.
    pub fn register<F, Fut>(&self, name: &str, description: Option<&str>, func: F) -> ChainResult<()>
    where
        F: Fn(Value, Baton) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let func: StepFn = Arc::new(move |value: Value, baton: Baton| func(value, baton).boxed());
        self.insert(name, description, func)
    }

    /// Register a synchronous validator.
    pub fn register_fn<F>(&self, name: &str, description: Option<&str>, func: F) -> ChainResult<()>
    where
        F: Fn(Value, &Baton) -> Result<Value, String> + Send + Sync + 'static,
    {
        let func: StepFn = Arc::new(move |value: Value, baton: Baton| {
            futures_util::future::ready(func(value, &baton)).boxed()
        });
        self.insert(name, description, func)
    }

    fn insert(&self, name: &str, description: Option<&str>, func: StepFn) -> ChainResult<()> {
        if name.is_empty() {
            return Err(ChainError::MissingValidatorName);
        }

        let mut validators = self
            .validators
            .write()
            .map_err(|_| ChainError::Internal("Lock poisoned".into()))?;

        if validators.contains_key(name) {
            return Err(ChainError::DuplicateValidator(name.to_string()));
        }

        validators.insert(
            name.to_string(),
            CustomValidator {
                description: description.map(str::to_string),
                func,
            },
        );
        drop(validators);

        log_event_with_fields(Event::ValidatorRegistered, &[("name", name)]);
        Ok(())
    }

    /// Build a chain step for `name`.
    pub fn step(&self, name: &str) -> ChainResult<Step> {
        let validators = self
            .validators
            .read()
            .map_err(|_| ChainError::Internal("Lock poisoned".into()))?;

        let validator = validators
            .get(name)
            .ok_or_else(|| ChainError::UnknownValidator(name.to_string()))?;

        let help = validator
            .description
            .clone()
            .unwrap_or_else(|| DEFAULT_HELP.to_string());
        Ok(Step::new(name, Some(help), validator.func.clone()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators
            .read()
            .map(|v| v.contains_key(name))
            .unwrap_or(false)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .validators
            .read()
            .map(|v| v.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valve::Chain;
    use serde_json::json;

    fn registry() -> ValidatorRegistry {
        let registry = ValidatorRegistry::new();
        registry
            .register_fn("toUpper", Some("Uppercase string"), |v, _| match v {
                Value::String(s) => Ok(Value::String(s.to_uppercase())),
                _ => Err("Not a string".to_string()),
            })
            .unwrap();
        registry
            .register("async_len", None, |v: Value, _| async move {
                Ok(json!(v.as_str().map(str::len).unwrap_or(0)))
            })
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_custom_step_runs() {
        let registry = registry();
        let chain = Chain::new().custom(&registry, "toUpper").unwrap();

        let out = chain.run(json!("hello"), &Baton::empty()).await.unwrap();
        assert_eq!(out, json!("HELLO"));
        assert_eq!(chain.help(), vec!["Uppercase string".to_string()]);
    }

    #[tokio::test]
    async fn test_async_custom_step() {
        let registry = registry();
        let chain = Chain::new().custom(&registry, "async_len").unwrap();

        assert_eq!(chain.run(json!("abcd"), &Baton::empty()).await.unwrap(), json!(4));
        assert_eq!(chain.help(), vec!["(help not found)".to_string()]);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = registry();
        let err = registry
            .register_fn("toUpper", None, |v, _| Ok(v))
            .unwrap_err();
        assert_eq!(err, ChainError::DuplicateValidator("toUpper".into()));
    }

    #[test]
    fn test_names_sorted() {
        let registry = registry();
        assert_eq!(registry.names(), vec!["async_len".to_string(), "toUpper".to_string()]);
        assert!(registry.contains("toUpper"));
        assert!(!registry.contains("nope"));
    }
}
