//! Serializer
//!
//! Converts live objects into JSON or XML text and parses that text back.
//!
//! # Pipeline
//!
//! 1. `ObjectBuilder` resolves a `LiveValue` against the type registry into a
//!    format-neutral `Node` tree (lazy values awaited, fields in declared order)
//! 2. An emitter renders the tree, applying `SerializerOptions`
//! 3. The matching parser turns text back into the plain-data projection of
//!    the tree
//!
//! # Usage
//!
//! ```ignore
//! let serializer = Serializer::new(&registry);
//! let text = serializer.serialize(Format::Xml, node.into()).await?;
//! let plain = serializer.deserialize(Format::Xml, &text)?;
//! ```

mod builder;
mod errors;
mod json;
mod live;
mod node;
mod options;
mod xml;

pub use builder::ObjectBuilder;
pub use errors::{BoxError, SerializeError, SerializeResult};
pub use live::{LazyFn, LiveValue, Serializable, TypedObject};
pub use node::Node;
pub use options::{Format, SerializerOptions};

use serde_json::Value;

use crate::observability::{log_event_with_fields, Event};
use crate::registry::TypeRegistry;

/// Serialize/deserialize facade over one registry
#[derive(Debug, Clone)]
pub struct Serializer<'r> {
    registry: &'r TypeRegistry,
    options: SerializerOptions,
}

impl<'r> Serializer<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            options: SerializerOptions::default(),
        }
    }

    /// Use `options` for every call that does not pass its own.
    pub fn with_options(mut self, options: SerializerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    /// Build the intermediate tree without rendering it.
    pub async fn build(&self, value: LiveValue) -> SerializeResult<Node> {
        ObjectBuilder::new(self.registry)
            .build(value)
            .await
            .map_err(|err| {
                log_event_with_fields(Event::BuildFailed, &[("error", err.to_string().as_str())]);
                err
            })
    }

    pub async fn serialize(&self, format: Format, value: LiveValue) -> SerializeResult<String> {
        self.serialize_with(format, value, &self.options).await
    }

    /// Serialize with per-call options.
    pub async fn serialize_with(
        &self,
        format: Format,
        value: LiveValue,
        options: &SerializerOptions,
    ) -> SerializeResult<String> {
        let node = self.build(value).await?;
        let text = self.render(format, &node, options)?;

        log_event_with_fields(
            Event::SerializeComplete,
            &[("format", format.as_str()), ("bytes", text.len().to_string().as_str())],
        );
        Ok(text)
    }

    /// Render an already built tree.
    pub fn render(&self, format: Format, node: &Node, options: &SerializerOptions) -> SerializeResult<String> {
        match format {
            Format::Json => json::emit(node, self.registry, options),
            Format::Xml => xml::emit(node, self.registry, options),
        }
    }

    /// Parse text produced by `serialize` back into plain data.
    pub fn deserialize(&self, format: Format, text: &str) -> SerializeResult<Value> {
        let parsed = match format {
            Format::Json => json::parse(text),
            Format::Xml => xml::parse(text, self.registry),
        };

        parsed.map_err(|err| {
            log_event_with_fields(
                Event::DeserializeFailed,
                &[("format", format.as_str()), ("error", err.to_string().as_str())],
            );
            err
        })
    }
}
