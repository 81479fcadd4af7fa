//! Validation subsystem
//!
//! Cleans, coerces and validates untrusted input objects.
//!
//! # Design Principles
//!
//! - Chains are immutable once built and reused across checks
//! - Steps run strictly in order; the first error wins
//! - Every error carries a stable, literal message
//! - Errors are located by key and parent-key path
//!
//! # Usage
//!
//! ```ignore
//! use swiz::valve::{Chain, ValidationSchema, Valve};
//!
//! let valve = Valve::new(
//!     ValidationSchema::new()
//!         .key("a", Chain::new().is_int())
//!         .nested("b", ValidationSchema::new().key("port", Chain::new().is_port())),
//! );
//! let cleaned = valve.check(&payload).await?;
//! ```

mod chain;
mod checker;
mod custom;
mod errors;
pub mod ip;
mod steps;

pub use chain::{Baton, Chain, Step, StepFn, StepFuture};
pub use checker::{FinalValidatorFn, SchemaEntry, ValidationSchema, Valve};
pub use custom::ValidatorRegistry;
pub use errors::{
    ChainError, ChainResult, CheckResult, ValidationError, ValidationErrorCode,
};
