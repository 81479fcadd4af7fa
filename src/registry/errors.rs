//! # Registry Errors

use thiserror::Error;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Type registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two types share a name
    #[error("Duplicate type definition: {0}")]
    DuplicateType(String),

    /// Lookup of a type that was never defined
    #[error("No definition for this type; no way to serialize {0}")]
    UnknownType(String),

    /// A definition file could not be read or parsed
    #[error("Malformed type definition at {path}: {reason}")]
    Malformed { path: String, reason: String },
}

impl RegistryError {
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        RegistryError::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Construction-time errors are configuration bugs; lookups are per-build.
    pub fn is_construction_error(&self) -> bool {
        !matches!(self, RegistryError::UnknownType(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_names_the_type() {
        let err = RegistryError::UnknownType("Widget".into());
        assert_eq!(
            err.to_string(),
            "No definition for this type; no way to serialize Widget"
        );
        assert!(!err.is_construction_error());
    }

    #[test]
    fn test_malformed_display() {
        let err = RegistryError::malformed("defs/node.json", "expected array");
        assert!(err.to_string().contains("defs/node.json"));
        assert!(err.is_construction_error());
    }
}
