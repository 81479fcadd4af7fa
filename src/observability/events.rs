//! Observable events
//!
//! Events are explicit and typed. Each maps to a stable string name and a
//! default severity.

use std::fmt;

use super::logger::Severity;

/// Observable events emitted by the registry, validation and serializer paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Type registry
    /// Registry built from in-code definitions
    RegistryDefined,
    /// Registry built from definition files
    RegistryLoaded,

    // Validation
    /// Custom validator added to a validator registry
    ValidatorRegistered,
    /// Valve rejected an input object
    CheckRejected,
    /// Final validator rejected a cleaned object
    FinalValidationRejected,

    // Serialization
    /// Object build aborted
    BuildFailed,
    /// Object serialized to text
    SerializeComplete,
    /// Text could not be parsed back
    DeserializeFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RegistryDefined => "REGISTRY_DEFINED",
            Event::RegistryLoaded => "REGISTRY_LOADED",
            Event::ValidatorRegistered => "VALIDATOR_REGISTERED",
            Event::CheckRejected => "CHECK_REJECTED",
            Event::FinalValidationRejected => "FINAL_VALIDATION_REJECTED",
            Event::BuildFailed => "BUILD_FAILED",
            Event::SerializeComplete => "SERIALIZE_COMPLETE",
            Event::DeserializeFailed => "DESERIALIZE_FAILED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::RegistryDefined | Event::RegistryLoaded | Event::ValidatorRegistered => {
                Severity::Info
            }
            Event::SerializeComplete => Severity::Trace,
            Event::CheckRejected | Event::FinalValidationRejected => Severity::Warn,
            Event::BuildFailed | Event::DeserializeFailed => Severity::Error,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
