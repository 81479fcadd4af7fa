//! # Serializer Errors

use thiserror::Error;

use super::Format;
use crate::registry::RegistryError;

/// Error produced by a lazy value
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for serializer operations
pub type SerializeResult<T> = Result<T, SerializeError>;

/// Serializer errors
#[derive(Debug, Error)]
pub enum SerializeError {
    /// A typed value names a type missing from the registry
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A lazy value failed to resolve
    #[error("Failed to resolve lazy value: {0}")]
    LazyValue(#[source] BoxError),

    /// Input text is not well-formed
    #[error("Malformed {format} input: {reason}")]
    Malformed { format: Format, reason: String },

    /// Input text is well-formed but does not match any definition
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The output writer failed
    #[error("Failed to write {format} output: {reason}")]
    Emit { format: Format, reason: String },
}

impl SerializeError {
    pub fn malformed(format: Format, reason: impl ToString) -> Self {
        SerializeError::Malformed {
            format,
            reason: reason.to_string(),
        }
    }

    pub fn emit(format: Format, reason: impl ToString) -> Self {
        SerializeError::Emit {
            format,
            reason: reason.to_string(),
        }
    }

    /// True for the deserialize-side failures.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            SerializeError::Malformed { .. } | SerializeError::SchemaMismatch(_)
        )
    }
}
