//! Type Registry
//!
//! Static description of named types and their fields, shared by the object
//! builder (outbound serialization) and the schema translator (inbound
//! validation).
//!
//! # Design Principles
//!
//! - Built once, read-only afterwards
//! - Type names are unique; duplicates fail construction
//! - Field order is serialization order
//! - Unknown types are reported by name

mod errors;
mod loader;
mod type_registry;
mod types;

pub use errors::{RegistryError, RegistryResult};
pub use type_registry::TypeRegistry;
pub use types::{CoercionKind, Field, ObjType};
