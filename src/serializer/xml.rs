//! XML emitter and parser
//!
//! Element naming:
//! - a typed root is named by its type's singular label
//! - a root sequence is wrapped in the type's plural label when every item
//!   shares one type with a distinct plural, otherwise in `group`
//! - a field holding a sequence is wrapped in the field's plural label and
//!   its items use the field's singular label; other values use the singular
//!   label
//! - typed values nested in a field keep their own type element
//! - plain maps render their keys as child elements; their sequences use
//!   `item` children
//!
//! Attribute fields (and fields promoted by options) become attributes of the
//! enclosing element when their value is a scalar. Null fields of a typed
//! value are not written and read back as null. Empty sequences and maps
//! render as `<name/>` unless elided.
//!
//! Where the element structure alone does not say what a value was, the
//! element carries a `type` hint (`array`, `object`, `number`, `boolean`) or
//! `nil="true"`:
//! - sequences whose wrapper is not a distinct plural label
//! - maps that are empty or whose single key is a type label
//! - numbers and booleans not restored by the field's coercion
//! - null items of sequences and null map entries
//!
//! Leaf text is kept as written, surrounding whitespace included. Attribute
//! values are text unless the field coerces them.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};

use super::errors::{SerializeError, SerializeResult};
use super::node::Node;
use super::options::{Format, SerializerOptions};
use crate::registry::{CoercionKind, Field, ObjType, TypeRegistry};

const GROUP: &str = "group";
const ITEM: &str = "item";
const ROOT_OBJECT: &str = "object";
const ROOT_VALUE: &str = "value";

const TYPE_ATTR: &str = "type";
const NIL_ATTR: &str = "nil";

/// Shape written next to an element whose structure is ambiguous
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hint {
    Array,
    Object,
    Number,
    Boolean,
}

impl Hint {
    fn as_str(self) -> &'static str {
        match self {
            Hint::Array => "array",
            Hint::Object => "object",
            Hint::Number => "number",
            Hint::Boolean => "boolean",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "array" => Some(Hint::Array),
            "object" => Some(Hint::Object),
            "number" => Some(Hint::Number),
            "boolean" => Some(Hint::Boolean),
            _ => None,
        }
    }

    fn of_scalar(value: &Value) -> Option<Self> {
        match value {
            Value::Number(_) => Some(Hint::Number),
            Value::Bool(_) => Some(Hint::Boolean),
            _ => None,
        }
    }

    fn coercion(self) -> Option<CoercionKind> {
        match self {
            Hint::Number => Some(CoercionKind::Number),
            Hint::Boolean => Some(CoercionKind::Boolean),
            Hint::Array | Hint::Object => None,
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn tag(name: &str, hint: Option<Hint>) -> BytesStart<'_> {
    let mut start = BytesStart::new(name);
    if let Some(hint) = hint {
        start.push_attribute((TYPE_ATTR, hint.as_str()));
    }
    start
}

// =============================================================================
// Emitter
// =============================================================================

pub fn emit(node: &Node, registry: &TypeRegistry, options: &SerializerOptions) -> SerializeResult<String> {
    let mut emitter = Emitter {
        writer: Writer::new(Vec::new()),
        registry,
        options,
    };
    emitter.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    emitter.writer.get_mut().push(b'\n');
    emitter.root(node)?;

    String::from_utf8(emitter.writer.into_inner()).map_err(|e| SerializeError::emit(Format::Xml, e))
}

struct Emitter<'a> {
    writer: Writer<Vec<u8>>,
    registry: &'a TypeRegistry,
    options: &'a SerializerOptions,
}

impl<'a> Emitter<'a> {
    fn write(&mut self, event: Event<'_>) -> SerializeResult<()> {
        self.writer
            .write_event(event)
            .map_err(|e| SerializeError::emit(Format::Xml, e))
    }

    fn start(&mut self, name: &str, hint: Option<Hint>) -> SerializeResult<()> {
        self.write(Event::Start(tag(name, hint)))
    }

    fn end(&mut self, name: &str) -> SerializeResult<()> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str, hint: Option<Hint>) -> SerializeResult<()> {
        self.write(Event::Empty(tag(name, hint)))
    }

    fn nil(&mut self, name: &str) -> SerializeResult<()> {
        let mut start = BytesStart::new(name);
        start.push_attribute((NIL_ATTR, "true"));
        self.write(Event::Empty(start))
    }

    fn root(&mut self, node: &Node) -> SerializeResult<()> {
        match node {
            Node::Typed { type_name, fields } => self.typed(type_name, fields),
            Node::Seq(items) => {
                let wrapper = self.root_sequence_name(items);
                if items.is_empty() {
                    return self.empty(&wrapper, None);
                }
                self.start(&wrapper, None)?;
                for item in items {
                    self.sequence_item(item, ITEM)?;
                }
                self.end(&wrapper)
            }
            Node::Map(entries) => {
                if entries.is_empty() {
                    return self.empty(ROOT_OBJECT, None);
                }
                self.start(ROOT_OBJECT, None)?;
                self.map_entries(entries)?;
                self.end(ROOT_OBJECT)
            }
            Node::Scalar(_) => self.value(ROOT_VALUE, node, None),
        }
    }

    fn root_sequence_name(&self, items: &[Node]) -> String {
        let mut type_names = items.iter().map(|item| match item {
            Node::Typed { type_name, .. } => Some(type_name.as_str()),
            _ => None,
        });
        let first = match type_names.next() {
            Some(Some(first)) => first,
            _ => return GROUP.to_string(),
        };
        if !type_names.all(|name| name == Some(first)) {
            return GROUP.to_string();
        }
        match self.registry.get(first) {
            Some(def) if def.plural_label() != def.singular_label() => def.plural_label().into_owned(),
            _ => GROUP.to_string(),
        }
    }

    fn typed(&mut self, type_name: &str, fields: &[(String, Node)]) -> SerializeResult<()> {
        let (registry, options) = (self.registry, self.options);
        let def = registry.lookup(type_name)?;
        let label = def.singular_label();
        let context = options.context();

        let mut start = BytesStart::new(label.as_ref());
        let mut children = Vec::new();

        for (name, node) in fields {
            let field = def.field_named(name);
            if field.map_or(false, |f| f.is_excluded_from(context)) || node.is_null() {
                continue;
            }

            let as_attribute = field.map_or(false, |f| f.is_attribute) || options.promotes(name);
            if let (true, Node::Scalar(value)) = (as_attribute, node) {
                start.push_attribute((name.as_str(), scalar_text(value).as_str()));
                continue;
            }

            if node.is_empty_collection() && options.elide_empty_collections {
                continue;
            }
            children.push((name.as_str(), field, node));
        }

        if children.is_empty() {
            return self.write(Event::Empty(start));
        }

        self.write(Event::Start(start))?;
        for (name, field, node) in children {
            self.field(name, field, node)?;
        }
        self.end(&label)
    }

    fn field(&mut self, name: &str, field: Option<&Field>, node: &Node) -> SerializeResult<()> {
        let singular = field.map_or(name, Field::singular_label);
        match node {
            Node::Seq(items) => {
                let plural = field.map_or(name, Field::plural_label);
                let hint = (plural == singular).then_some(Hint::Array);
                self.sequence(plural, hint, items, singular)
            }
            other => self.value(singular, other, field.and_then(|f| f.coercion)),
        }
    }

    fn sequence(
        &mut self,
        name: &str,
        hint: Option<Hint>,
        items: &[Node],
        item_name: &str,
    ) -> SerializeResult<()> {
        if items.is_empty() {
            if self.options.elide_empty_collections {
                return Ok(());
            }
            return self.empty(name, hint);
        }
        self.start(name, hint)?;
        for item in items {
            self.sequence_item(item, item_name)?;
        }
        self.end(name)
    }

    fn sequence_item(&mut self, item: &Node, item_name: &str) -> SerializeResult<()> {
        match item {
            Node::Typed { type_name, fields } => self.typed(type_name, fields),
            other => self.value(item_name, other, None),
        }
    }

    /// `coercion` is the field coercion that restores a scalar's type on parse.
    fn value(&mut self, name: &str, node: &Node, coercion: Option<CoercionKind>) -> SerializeResult<()> {
        match node {
            Node::Scalar(Value::Null) => self.nil(name),
            Node::Scalar(value) => self.scalar(name, value, coercion),
            Node::Typed { type_name, fields } => {
                self.start(name, None)?;
                self.typed(type_name, fields)?;
                self.end(name)
            }
            Node::Map(entries) => {
                let hint = self.map_hint(entries);
                if entries.is_empty() {
                    if self.options.elide_empty_collections {
                        return Ok(());
                    }
                    return self.empty(name, hint);
                }
                self.start(name, hint)?;
                self.map_entries(entries)?;
                self.end(name)
            }
            Node::Seq(items) => self.sequence(name, Some(Hint::Array), items, ITEM),
        }
    }

    /// A map reads back as a map unless it is empty or looks like a typed
    /// value's wrapper.
    fn map_hint(&self, entries: &[(String, Node)]) -> Option<Hint> {
        let ambiguous = match entries {
            [] => true,
            [(key, _)] => self.registry.by_singular_label(key).is_some(),
            _ => false,
        };
        ambiguous.then_some(Hint::Object)
    }

    fn map_entries(&mut self, entries: &[(String, Node)]) -> SerializeResult<()> {
        for (key, node) in entries {
            self.value(key, node, None)?;
        }
        Ok(())
    }

    fn scalar(&mut self, name: &str, value: &Value, coercion: Option<CoercionKind>) -> SerializeResult<()> {
        let hint = Hint::of_scalar(value).filter(|hint| hint.coercion() != coercion);
        let text = scalar_text(value);
        self.start(name, hint)?;
        self.write(Event::Text(BytesText::new(&text)))?;
        self.end(name)
    }
}

// =============================================================================
// Parser
// =============================================================================

#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
    self_closing: bool,
}

impl Element {
    fn open(start: &BytesStart<'_>, self_closing: bool) -> SerializeResult<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| SerializeError::malformed(Format::Xml, e))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| SerializeError::malformed(Format::Xml, e))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            self_closing,
            ..Self::default()
        })
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn is_nil(&self) -> bool {
        self.attribute(NIL_ATTR) == Some("true")
    }

    fn hint(&self) -> Option<Hint> {
        self.attribute(TYPE_ATTR).and_then(Hint::parse)
    }
}

/// Text is kept untrimmed. Whitespace between child elements ends up in the
/// parent's `text`, which is only read for elements without children.
fn read_tree(text: &str) -> SerializeResult<Element> {
    let mut reader = Reader::from_str(text);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(Element::open(&e, false)?),
            Ok(Event::Empty(e)) => attach(&mut stack, &mut root, Element::open(&e, true)?)?,
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| SerializeError::malformed(Format::Xml, "unexpected closing tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| SerializeError::malformed(Format::Xml, err))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SerializeError::malformed(Format::Xml, e)),
        }
    }

    if !stack.is_empty() {
        return Err(SerializeError::malformed(Format::Xml, "unclosed element"));
    }
    root.ok_or_else(|| SerializeError::malformed(Format::Xml, "no root element"))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> SerializeResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => {
            return Err(SerializeError::malformed(Format::Xml, "multiple root elements"))
        }
        None => *root = Some(element),
    }
    Ok(())
}

/// Parse XML text back into the plain-data projection of the tree it was
/// rendered from.
pub fn parse(text: &str, registry: &TypeRegistry) -> SerializeResult<Value> {
    let root = read_tree(text)?;
    Rebuilder { registry }.root(&root)
}

struct Rebuilder<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> Rebuilder<'a> {
    fn root(&self, el: &Element) -> SerializeResult<Value> {
        if el.name == GROUP {
            return self.items(el, ITEM);
        }
        if let Some(def) = self.registry.by_plural_label(&el.name) {
            let item_name = def.singular_label();
            return el
                .children
                .iter()
                .map(|child| match self.registry.by_singular_label(&child.name) {
                    Some(def) if child.name == item_name => self.typed(def, child),
                    _ => self.element(child, None),
                })
                .collect::<SerializeResult<Vec<_>>>()
                .map(Value::Array);
        }
        if let Some(def) = self.registry.by_singular_label(&el.name) {
            return self.typed(def, el);
        }
        match el.name.as_str() {
            ROOT_OBJECT => self.map(el),
            ROOT_VALUE if el.self_closing && el.attributes.is_empty() => Ok(Value::Null),
            ROOT_VALUE => self.element(el, None),
            other => Err(SerializeError::SchemaMismatch(format!(
                "Unknown root element <{}>",
                other
            ))),
        }
    }

    /// Declared fields missing from the element read back as null.
    fn typed(&self, def: &ObjType, el: &Element) -> SerializeResult<Value> {
        let mut out = Map::new();
        for field in &def.fields {
            if let Some(text) = el.attribute(&field.name) {
                out.insert(field.name.clone(), coerce(field.coercion, text));
                continue;
            }
            let child = el.children.iter().find(|child| {
                child.name == field.plural_label() || child.name == field.singular_label()
            });
            let value = match child {
                Some(child) => self.field(field, child)?,
                None => Value::Null,
            };
            out.insert(field.name.clone(), value);
        }
        Ok(Value::Object(out))
    }

    fn field(&self, field: &Field, el: &Element) -> SerializeResult<Value> {
        let distinct_labels = field.plural_label() != field.singular_label();
        if distinct_labels && el.name == field.plural_label() && !el.is_nil() {
            return self.items(el, field.singular_label());
        }
        self.element(el, Some(field))
    }

    /// Every child is one sequence item. Children named after a type, other
    /// than `item_name`, are typed values.
    fn items(&self, el: &Element, item_name: &str) -> SerializeResult<Value> {
        el.children
            .iter()
            .map(|child| match self.registry.by_singular_label(&child.name) {
                Some(def) if child.name != item_name => self.typed(def, child),
                _ => self.element(child, None),
            })
            .collect::<SerializeResult<Vec<_>>>()
            .map(Value::Array)
    }

    /// `field` is set when `el` holds a field's value directly.
    fn element(&self, el: &Element, field: Option<&Field>) -> SerializeResult<Value> {
        if el.is_nil() {
            return Ok(Value::Null);
        }
        let item_name = field.map_or(ITEM, Field::singular_label);

        if let Some(hint) = el.hint() {
            return match hint {
                Hint::Array => self.items(el, item_name),
                Hint::Object => self.map(el),
                Hint::Number | Hint::Boolean => Ok(coerce(hint.coercion(), &el.text)),
            };
        }

        let first = match el.children.first() {
            Some(first) => first,
            None if el.self_closing => return Ok(Value::Array(Vec::new())),
            None => return Ok(coerce(field.and_then(|f| f.coercion), &el.text)),
        };

        if el.children.len() == 1 {
            if let Some(def) = self.registry.by_singular_label(&first.name) {
                return self.typed(def, first);
            }
        }

        let repeated = el.children.len() > 1 && el.children.iter().all(|child| child.name == first.name);
        if repeated {
            return self.items(el, item_name);
        }

        self.map(el)
    }

    fn map(&self, el: &Element) -> SerializeResult<Value> {
        let mut out = Map::new();
        for child in &el.children {
            out.insert(child.name.clone(), self.element(child, None)?);
        }
        Ok(Value::Object(out))
    }
}

fn coerce(kind: Option<CoercionKind>, text: &str) -> Value {
    match kind {
        Some(kind) => kind
            .coerce(text)
            .unwrap_or_else(|| Value::String(text.to_string())),
        None => Value::String(text.to_string()),
    }
}
