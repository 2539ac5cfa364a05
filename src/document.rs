//! # Secret documents
//!
//! A secret document is the payload stored in the secret manager: a JSON or
//! relaxed JSON (JSON5) object whose leaves become environment variables.
//!
//! Documents are decoded into a closed [`Node`] tree. Mappings keep their
//! insertion order for both the flattened output and the re-encoded JSON.
//!
//! ```text
//! {
//!     // comments and trailing commas are accepted
//!     database: { user: "app", password: "hunter2", },
//!     port: 5432,
//! }
//! ```

use crate::error::ParseError;
use crate::relaxed;
use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Number;
use serde_json::ser::{Formatter, PrettyFormatter};
use std::fmt;
use std::io;

/// Indentation used when re-encoding a document as JSON.
pub const JSON_INDENT: &[u8] = b"    ";

/// A leaf value of a secret document.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Scalar {
    /// Renders the scalar the way it appears in an environment variable.
    ///
    /// Strings are verbatim, booleans are `true`/`false`, numbers use their
    /// canonical decimal form and null becomes the empty string.
    ///
    /// Integral floats below `1e21` drop the fraction (`1e3` renders as
    /// `1000`); other floats use the shortest round-trip form.
    pub fn render(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(value) => value.to_string(),
            Scalar::Number(value) => render_number(value),
            Scalar::String(value) => value.clone(),
        }
    }
}

fn render_number(number: &Number) -> String {
    match number.as_f64() {
        Some(value) if number.is_f64() && value.fract() == 0.0 && value.abs() < 1e21 => {
            if value == 0.0 {
                "0".to_string()
            } else {
                format!("{value}")
            }
        }
        _ => number.to_string(),
    }
}

/// A node in a decoded secret document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Scalar),
    Mapping(IndexMap<String, Node>),
    Sequence(Vec<Node>),
}

impl Node {
    /// Number of scalar leaves below (and including) this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            Node::Scalar(_) => 1,
            Node::Mapping(entries) => entries.values().map(Node::leaf_count).sum(),
            Node::Sequence(items) => items.iter().map(Node::leaf_count).sum(),
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Scalar(Scalar::String(value.to_string()))
    }
}

/// A decoded secret document.
///
/// Built once per invocation from the fetched bytes and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Node,
}

impl Document {
    /// Decodes a JSON or relaxed JSON document.
    ///
    /// Strict JSON is tried first. Anything it rejects is rewritten from
    /// relaxed JSON into strict JSON and decoded the same way, so both
    /// syntaxes keep unsigned, signed and float numbers exactly as written.
    /// Empty (or whitespace only) input is an empty mapping.
    ///
    /// # Errors
    ///
    /// * [`ParseError::Encoding`] if the bytes are not UTF-8
    /// * [`ParseError::Syntax`] if the text is neither JSON nor JSON5
    /// * [`ParseError::Decode`] for well formed text the decoder still
    ///   rejects, such as numbers out of `f64` range
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(bytes)?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        if text.trim().is_empty() {
            return Ok(Self::empty());
        }

        if let Ok(root) = serde_json::from_str::<Node>(text) {
            return Ok(Self { root });
        }

        let strict = relaxed::to_strict_json(text)?;
        let root = serde_json::from_str::<Node>(&strict)?;
        Ok(Self { root })
    }

    /// A document with an empty root mapping.
    pub fn empty() -> Self {
        Self {
            root: Node::Mapping(IndexMap::new()),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Returns `true` when the document has no scalar leaves.
    pub fn is_empty(&self) -> bool {
        self.root.leaf_count() == 0
    }

    /// Re-encodes the document as indented JSON containing only ASCII.
    ///
    /// Every non-ASCII character is written as a `\uXXXX` escape, using a
    /// UTF-16 surrogate pair outside the Basic Multilingual Plane. The output
    /// ends with a newline.
    pub fn to_ascii_json(&self) -> serde_json::Result<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = AsciiFormatter::new(JSON_INDENT);
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.root.serialize(&mut serializer)?;
        out.push(b'\n');
        Ok(out)
    }
}

impl From<Node> for Document {
    fn from(root: Node) -> Self {
        Self { root }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Scalar(Scalar::Null) => serializer.serialize_unit(),
            Node::Scalar(Scalar::Bool(value)) => serializer.serialize_bool(*value),
            Node::Scalar(Scalar::Number(value)) => value.serialize(serializer),
            Node::Scalar(Scalar::String(value)) => serializer.serialize_str(value),
            Node::Mapping(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Node::Sequence(items) => serializer.collect_seq(items),
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::Bool(value)))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::Number(value.into())))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::Number(value.into())))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Node, E> {
        Number::from_f64(value)
            .map(|number| Node::Scalar(Scalar::Number(number)))
            .ok_or_else(|| E::custom(format!("non-finite number {value} is not supported")))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Node, E> {
        Ok(Node::from(value))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::String(value)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::Null))
    }

    fn visit_none<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::Null))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Node, D::Error> {
        Node::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Node::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
        let mut entries = IndexMap::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, Node>()? {
            entries.insert(key, value);
        }
        Ok(Node::Mapping(entries))
    }
}

/// Pretty JSON formatter that escapes everything outside ASCII.
struct AsciiFormatter<'a> {
    inner: PrettyFormatter<'a>,
}

impl<'a> AsciiFormatter<'a> {
    fn new(indent: &'a [u8]) -> Self {
        Self {
            inner: PrettyFormatter::with_indent(indent),
        }
    }
}

impl Formatter for AsciiFormatter<'_> {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }

        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}
