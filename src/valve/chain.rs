//! Validator chains
//!
//! A `Chain` is an immutable ordered list of steps. Builder methods consume
//! the chain and return it with one more step appended, so chains compose
//! left to right:
//!
//! ```ignore
//! let chain = Chain::new().is_string().not_empty().len(1, Some(32));
//! ```
//!
//! `run` feeds the value through each step in order and stops at the first
//! error. A step never sees a value that an earlier step rejected.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::Value;

use super::custom::ValidatorRegistry;
use super::errors::{ChainError, ChainResult};

/// Future returned by a step
pub type StepFuture = BoxFuture<'static, Result<Value, String>>;

/// Step function: takes the value and the baton, yields the cleaned value or
/// an error message.
pub type StepFn = Arc<dyn Fn(Value, Baton) -> StepFuture + Send + Sync>;

/// Opaque context threaded unchanged through every step of a check
#[derive(Clone, Default)]
pub struct Baton(Option<Arc<dyn Any + Send + Sync>>);

impl Baton {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    pub fn empty() -> Self {
        Self(None)
    }

    /// Borrow the carried value if it is a `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|value| value.downcast_ref::<T>())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for Baton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Baton(..)"),
            None => f.write_str("Baton(empty)"),
        }
    }
}

/// One step of a chain
#[derive(Clone)]
pub struct Step {
    name: String,
    help: Option<String>,
    func: StepFn,
}

impl Step {
    pub fn new(name: impl Into<String>, help: Option<String>, func: StepFn) -> Self {
        Self {
            name: name.into(),
            help,
            func,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn call(&self, value: Value, baton: Baton) -> StepFuture {
        (self.func)(value, baton)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("help", &self.help)
            .finish()
    }
}

/// Ordered validator pipeline plus chain-level flags
#[derive(Clone, Default)]
pub struct Chain {
    steps: Vec<Step>,
    optional: bool,
    immutable: bool,
    update_required: bool,
    rename_target: Option<String>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn push(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append a synchronous step.
    pub fn sync_step<F>(self, name: &str, help: Option<String>, func: F) -> Self
    where
        F: Fn(Value, &Baton) -> Result<Value, String> + Send + Sync + 'static,
    {
        let step_fn: StepFn = Arc::new(move |value: Value, baton: Baton| {
            future::ready(func(value, &baton)).boxed()
        });
        self.push(Step::new(name, help, step_fn))
    }

    fn prepend_marker(mut self, name: &str, help: &str) -> Self {
        let func: StepFn = Arc::new(|value: Value, _: Baton| future::ready(Ok(value)).boxed());
        self.steps
            .insert(0, Step::new(name, Some(help.to_string()), func));
        self
    }

    /// Missing key is tolerated.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self.prepend_marker("optional", "Optional")
    }

    /// Key must not appear in a partial check.
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self.prepend_marker("immutable", "Immutable")
    }

    /// Key must appear even in a partial check.
    pub fn update_required(mut self) -> Self {
        self.update_required = true;
        self.prepend_marker("update_required", "Required for update")
    }

    /// Write the cleaned value under `target`. Adds no step.
    pub fn rename(mut self, target: impl Into<String>) -> Self {
        self.rename_target = Some(target.into());
        self
    }

    /// Append a validator registered under `name`.
    pub fn custom(self, registry: &ValidatorRegistry, name: &str) -> ChainResult<Self> {
        if name.is_empty() {
            return Err(ChainError::MissingValidatorName);
        }
        let step = registry.step(name)?;
        Ok(self.push(step))
    }

    /// Run every step in order, stopping at the first error.
    pub async fn run(&self, value: Value, baton: &Baton) -> Result<Value, String> {
        let mut value = value;
        for step in &self.steps {
            value = step.call(value, baton.clone()).await?;
        }
        Ok(value)
    }

    /// Index of the first step called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.name == name)
    }

    pub fn has_validator(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Help text of every step that has one, in order.
    pub fn help(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter_map(|step| step.help.clone())
            .collect()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub fn is_update_required(&self) -> bool {
        self.update_required
    }

    pub fn rename_target(&self) -> Option<&str> {
        self.rename_target.as_deref()
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("steps", &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("optional", &self.optional)
            .field("immutable", &self.immutable)
            .field("update_required", &self.update_required)
            .field("rename_target", &self.rename_target)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let chain = Chain::new()
            .sync_step("double", None, |v, _| Ok(json!(v.as_i64().unwrap() * 2)))
            .sync_step("inc", None, |v, _| Ok(json!(v.as_i64().unwrap() + 1)));

        assert_eq!(chain.run(json!(5), &Baton::empty()).await.unwrap(), json!(11));
    }

    #[tokio::test]
    async fn test_first_error_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let chain = Chain::new()
            .sync_step("reject", None, |_, _| Err("nope".to_string()))
            .sync_step("count", None, move |v, _| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(v)
            });

        let err = chain.run(json!(1), &Baton::empty()).await.unwrap_err();
        assert_eq!(err, "nope");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_baton_reaches_steps() {
        let chain = Chain::new().sync_step("with_baton", None, |v, baton| {
            match baton.get::<String>() {
                Some(user) => Ok(json!(format!("{}:{}", user, v.as_str().unwrap_or("")))),
                None => Err("no baton".to_string()),
            }
        });

        let baton = Baton::new("alice".to_string());
        assert_eq!(chain.run(json!("x"), &baton).await.unwrap(), json!("alice:x"));
        assert_eq!(
            chain.run(json!("x"), &Baton::empty()).await.unwrap_err(),
            "no baton"
        );
    }

    #[test]
    fn test_markers_lead_the_chain() {
        let chain = Chain::new().is_int().optional();
        assert!(chain.is_optional());
        assert_eq!(chain.position("optional"), Some(0));
        assert_eq!(chain.position("is_int"), Some(1));

        let chain = chain.immutable().update_required();
        assert_eq!(chain.position("update_required"), Some(0));
        assert_eq!(chain.position("immutable"), Some(1));
        assert!(chain.is_immutable() && chain.is_update_required());
    }

    #[test]
    fn test_rename_adds_no_step() {
        let chain = Chain::new().is_string().rename("hash_id");
        assert_eq!(chain.step_count(), 1);
        assert_eq!(chain.rename_target(), Some("hash_id"));
        assert!(!chain.has_validator("rename"));
    }

    #[test]
    fn test_step_count_next_to_len_step() {
        let chain = Chain::new().is_string().len(1, Some(4));
        assert_eq!(chain.step_count(), 2);
        assert!(chain.has_validator("len"));
        assert!(!chain.is_empty());
    }

    #[test]
    fn test_help_skips_undescribed_steps() {
        let chain = Chain::new().optional().to_int().is_int();
        assert_eq!(chain.help(), vec!["Optional".to_string(), "Integer".to_string()]);
    }

    #[test]
    fn test_custom_requires_a_name() {
        let registry = ValidatorRegistry::new();
        let err = Chain::new().custom(&registry, "").unwrap_err();
        assert_eq!(err, ChainError::MissingValidatorName);

        let err = Chain::new().custom(&registry, "toUpper").unwrap_err();
        assert_eq!(err.to_string(), "Unknown validator name 'toUpper'");
    }
}
