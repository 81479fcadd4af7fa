//! Serializer configuration

use std::fmt;

/// Wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Xml,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "JSON",
            Format::Xml => "XML",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Render-time options.
///
/// Build output is unaffected; options only change how the tree is rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializerOptions {
    /// Omit keys whose value is null or absent.
    pub strip_nulls: bool,
    /// Active output context; fields excluded from it are omitted.
    pub for_context: Option<String>,
    /// Extra field names rendered as XML attributes.
    pub use_as_attribute: Vec<String>,
    /// Omit empty arrays and maps from XML instead of writing `<name/>`.
    pub elide_empty_collections: bool,
    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl SerializerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for output filtered to `context`.
    pub fn for_context(context: impl Into<String>) -> Self {
        Self {
            for_context: Some(context.into()),
            ..Self::default()
        }
    }

    pub fn strip_nulls(mut self) -> Self {
        self.strip_nulls = true;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.for_context = Some(context.into());
        self
    }

    pub fn with_attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.use_as_attribute = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn elide_empty_collections(mut self) -> Self {
        self.elide_empty_collections = true;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    pub fn context(&self) -> Option<&str> {
        self.for_context.as_deref()
    }

    /// Whether `field` is promoted to an attribute by these options.
    pub fn promotes(&self, field: &str) -> bool {
        self.use_as_attribute.iter().any(|name| name == field)
    }
}
