//! Validation error types
//!
//! Error codes:
//! - SWIZ_FIELD_INVALID (a chain step rejected the value)
//! - SWIZ_MISSING_KEY (required key absent)
//! - SWIZ_IMMUTABLE_KEY (immutable key present in a partial check)
//! - SWIZ_STRUCTURAL (nested schema applied to a non-map)
//! - SWIZ_FINAL_VALIDATION (whole-object rule failed)

use std::fmt;

use thiserror::Error;

/// Result type for `Valve` checks
pub type CheckResult<T> = Result<T, ValidationError>;

/// Result type for chain construction
pub type ChainResult<T> = Result<T, ChainError>;

/// Validation error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    /// A chain step rejected the value
    FieldInvalid,
    /// A required key is absent
    MissingKey,
    /// An immutable key appeared in a partial check
    ImmutableKey,
    /// The value shape does not match the schema shape
    Structural,
    /// The final validator rejected the cleaned object
    FinalValidation,
}

impl ValidationErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ValidationErrorCode::FieldInvalid => "SWIZ_FIELD_INVALID",
            ValidationErrorCode::MissingKey => "SWIZ_MISSING_KEY",
            ValidationErrorCode::ImmutableKey => "SWIZ_IMMUTABLE_KEY",
            ValidationErrorCode::Structural => "SWIZ_STRUCTURAL",
            ValidationErrorCode::FinalValidation => "SWIZ_FINAL_VALIDATION",
        }
    }
}

impl fmt::Display for ValidationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A located validation failure
///
/// `message` is the literal text produced by the failing step or rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    code: ValidationErrorCode,
    key: Option<String>,
    parent_keys: Vec<String>,
    message: String,
}

impl ValidationError {
    fn located(
        code: ValidationErrorCode,
        key: &str,
        parent_keys: &[String],
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            key: Some(key.to_string()),
            parent_keys: parent_keys.to_vec(),
            message: message.into(),
        }
    }

    /// A chain step failed for `key`.
    pub fn field_invalid(key: &str, parent_keys: &[String], message: impl Into<String>) -> Self {
        Self::located(ValidationErrorCode::FieldInvalid, key, parent_keys, message)
    }

    pub fn missing_key(key: &str, parent_keys: &[String]) -> Self {
        Self::located(
            ValidationErrorCode::MissingKey,
            key,
            parent_keys,
            format!("Missing required key ({})", key),
        )
    }

    pub fn immutable_key(key: &str, parent_keys: &[String]) -> Self {
        Self::located(
            ValidationErrorCode::ImmutableKey,
            key,
            parent_keys,
            "Attempted to mutate immutable key",
        )
    }

    /// A nested schema was applied to a value that is not a map.
    pub fn not_a_hash(key: Option<&str>, parent_keys: &[String]) -> Self {
        Self {
            code: ValidationErrorCode::Structural,
            key: key.map(str::to_string),
            parent_keys: parent_keys.to_vec(),
            message: "Not a hash".to_string(),
        }
    }

    pub fn final_validation(message: impl Into<String>) -> Self {
        Self {
            code: ValidationErrorCode::FinalValidation,
            key: None,
            parent_keys: Vec::new(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ValidationErrorCode {
        self.code
    }

    /// Key the error is attached to; `None` for whole-object failures.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Path of enclosing keys, outermost first.
    pub fn parent_keys(&self) -> &[String] {
        &self.parent_keys
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised while building a chain or registering validators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Missing custom validator name")]
    MissingValidatorName,

    #[error("Unknown validator name '{0}'")]
    UnknownValidator(String),

    #[error("Validator already registered: {0}")]
    DuplicateValidator(String),

    #[error("Invalid regular expression '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_message() {
        let err = ValidationError::missing_key("agent_name", &[]);
        assert_eq!(err.message(), "Missing required key (agent_name)");
        assert_eq!(err.key(), Some("agent_name"));
        assert_eq!(err.code(), ValidationErrorCode::MissingKey);
    }

    #[test]
    fn test_display_is_the_literal_message() {
        let parents = vec!["a".to_string()];
        let err = ValidationError::field_invalid("b", &parents, "Value out of range (1..65535)");
        assert_eq!(err.to_string(), "Value out of range (1..65535)");
        assert_eq!(err.parent_keys(), &["a".to_string()]);
    }

    #[test]
    fn test_final_validation_has_no_key() {
        let err = ValidationError::final_validation("Passwords differ");
        assert!(err.key().is_none());
        assert_eq!(err.code().code(), "SWIZ_FINAL_VALIDATION");
    }

    #[test]
    fn test_chain_error_messages() {
        assert_eq!(
            ChainError::UnknownValidator("toUpper".into()).to_string(),
            "Unknown validator name 'toUpper'"
        );
        assert_eq!(
            ChainError::MissingValidatorName.to_string(),
            "Missing custom validator name"
        );
    }
}
