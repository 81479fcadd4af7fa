//! swiz - Schema-driven object serialization and input validation
//!
//! One declarative type registry drives two paths:
//!
//! - Outbound: live, possibly lazily computed objects are built into an
//!   ordered tree and rendered as JSON or XML (and parsed back)
//! - Inbound: untrusted payloads are cleaned and validated by chains of
//!   async steps, either hand-written or derived from the registry

pub mod observability;
pub mod registry;
pub mod serializer;
pub mod translate;
pub mod valve;

pub use registry::{CoercionKind, Field, ObjType, RegistryError, TypeRegistry};
pub use serializer::{
    Format, LiveValue, ObjectBuilder, Serializable, SerializeError, Serializer,
    SerializerOptions, TypedObject,
};
pub use translate::derive_validation_schema;
pub use valve::{
    Baton, Chain, ChainError, ValidationError, ValidationErrorCode, ValidationSchema,
    ValidatorRegistry, Valve,
};
