//! Flattening of nested documents into qualified key/value lines.

use crate::document::Node;
use crate::{InjectError, Result};
use std::fmt;
use std::str::FromStr;

/// Name of the document root. Top-level keys are emitted without it; only a
/// scalar root is keyed by it.
pub const ROOT_PREFIX: &str = "environment";

const PLACEHOLDER: &str = "%s";

/// A line format with two `%s` placeholders: the key, then the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTemplate {
    template: String,
}

impl LineTemplate {
    /// `KEY="VALUE"`, understood by ash and other POSIX shells.
    pub const ASH: &'static str = r#"%s="%s""#;
    /// `export KEY="VALUE"`, for sourcing into bash.
    pub const BASH: &'static str = r#"export %s="%s""#;

    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if template.matches(PLACEHOLDER).count() != 2 {
            return Err(InjectError::Template(template));
        }
        Ok(Self { template })
    }

    pub fn ash() -> Self {
        Self {
            template: Self::ASH.to_string(),
        }
    }

    pub fn bash() -> Self {
        Self {
            template: Self::BASH.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Fills the two placeholders with `key` and `value`.
    pub fn render(&self, key: &str, value: &str) -> String {
        let mut parts = self.template.splitn(3, PLACEHOLDER);
        let head = parts.next().unwrap_or_default();
        let middle = parts.next().unwrap_or_default();
        let tail = parts.next().unwrap_or_default();

        let mut line = String::with_capacity(self.template.len() + key.len() + value.len());
        line.push_str(head);
        line.push_str(key);
        line.push_str(middle);
        line.push_str(value);
        line.push_str(tail);
        line
    }
}

impl FromStr for LineTemplate {
    type Err = InjectError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for LineTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// One leaf of a flattened document.
///
/// Keys are not sanitized: a key containing whitespace or `=` is emitted
/// as-is and may not be a valid shell assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntry<'t> {
    pub key: String,
    pub value: String,
    template: &'t LineTemplate,
}

impl FlatEntry<'_> {
    /// The entry formatted with its line template.
    pub fn render(&self) -> String {
        self.template.render(&self.key, &self.value)
    }

    pub fn template(&self) -> &LineTemplate {
        self.template
    }

    /// The `(KEY, VALUE)` pair for a child environment.
    pub fn into_assignment(self) -> (String, String) {
        (self.key, self.value)
    }
}

impl fmt::Display for FlatEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Walks `root` depth first and emits one entry per scalar leaf.
///
/// Mapping children are qualified as `parent.key` and sequence elements as
/// `parent.<index>`, in document order. Mappings and sequences themselves
/// produce no entry, so an empty document yields no entries.
pub fn flatten<'t>(
    root: &Node,
    root_prefix: &str,
    template: &'t LineTemplate,
) -> Vec<FlatEntry<'t>> {
    let mut entries = Vec::with_capacity(root.leaf_count());
    walk(root, None, root_prefix, template, &mut entries);
    entries
}

fn walk<'t>(
    node: &Node,
    path: Option<&str>,
    root_prefix: &str,
    template: &'t LineTemplate,
    entries: &mut Vec<FlatEntry<'t>>,
) {
    match node {
        Node::Scalar(scalar) => entries.push(FlatEntry {
            key: path.unwrap_or(root_prefix).to_string(),
            value: scalar.render(),
            template,
        }),
        Node::Mapping(children) => {
            for (key, child) in children {
                let child_path = qualify(path, key);
                walk(child, Some(&child_path), root_prefix, template, entries);
            }
        }
        Node::Sequence(items) => {
            for (index, item) in items.iter().enumerate() {
                let child_path = qualify(path, &index.to_string());
                walk(item, Some(&child_path), root_prefix, template, entries);
            }
        }
    }
}

fn qualify(path: Option<&str>, segment: &str) -> String {
    match path {
        Some(parent) => format!("{parent}.{segment}"),
        None => segment.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn lines(input: &str, template: &LineTemplate) -> Vec<String> {
        let doc = Document::parse(input.as_bytes()).unwrap();
        flatten(doc.root(), ROOT_PREFIX, template)
            .iter()
            .map(FlatEntry::render)
            .collect()
    }

    #[test]
    fn test_flatten_nested_mapping_ash() {
        let out = lines(
            r#"{"db":{"user":"a","pass":"b"},"port":5432}"#,
            &LineTemplate::ash(),
        );
        assert_eq!(out, vec![r#"db.user="a""#, r#"db.pass="b""#, r#"port="5432""#]);
    }

    #[test]
    fn test_flatten_bash_template() {
        let out = lines(r#"{"API_KEY":"xyz"}"#, &LineTemplate::bash());
        assert_eq!(out, vec![r#"export API_KEY="xyz""#]);
    }

    #[test]
    fn test_flatten_sequences_use_indexes() {
        let out = lines(
            r#"{"hosts":["a","b"],"matrix":[[1],[2,3]],"list":[{"k":"v"}]}"#,
            &LineTemplate::ash(),
        );
        assert_eq!(
            out,
            vec![
                r#"hosts.0="a""#,
                r#"hosts.1="b""#,
                r#"matrix.0.0="1""#,
                r#"matrix.1.0="2""#,
                r#"matrix.1.1="3""#,
                r#"list.0.k="v""#,
            ]
        );
    }

    #[test]
    fn test_flatten_scalar_rendering() {
        let out = lines(
            r#"{"on":true,"off":false,"none":null,"pi":3.25}"#,
            &LineTemplate::ash(),
        );
        assert_eq!(
            out,
            vec![r#"on="true""#, r#"off="false""#, r#"none="""#, r#"pi="3.25""#]
        );
    }

    #[test]
    fn test_flatten_empty_document() {
        let doc = Document::empty();
        let template = LineTemplate::ash();
        assert!(flatten(doc.root(), ROOT_PREFIX, &template).is_empty());

        let out = lines(r#"{"empty":{},"nothing":[]}"#, &template);
        assert!(out.is_empty());
    }

    #[test]
    fn test_flatten_root_scalar_uses_prefix() {
        let out = lines(r#""just a string""#, &LineTemplate::ash());
        assert_eq!(out, vec![r#"environment="just a string""#]);
    }

    #[test]
    fn test_flatten_root_sequence() {
        let out = lines(r#"["a","b"]"#, &LineTemplate::ash());
        assert_eq!(out, vec![r#"0="a""#, r#"1="b""#]);
    }

    #[test]
    fn test_flatten_does_not_sanitize_keys() {
        let out = lines(r#"{"has space":"1","a=b":"2"}"#, &LineTemplate::ash());
        assert_eq!(out, vec![r#"has space="1""#, r#"a=b="2""#]);
    }

    #[test]
    fn test_flatten_entry_count_matches_leaves() {
        let doc = Document::parse(
            br#"{"a":{"b":[1,2,{"c":null}],"d":{}},"e":"x","f":[[],[true]]}"#,
        )
        .unwrap();
        let template = LineTemplate::ash();
        let entries = flatten(doc.root(), ROOT_PREFIX, &template);
        assert_eq!(entries.len(), doc.root().leaf_count());
        assert_eq!(entries.len(), 5);
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let doc = Document::parse(br#"{"z":1,"a":{"y":[1,2],"b":"c"}}"#).unwrap();
        let template = LineTemplate::bash();
        let first: Vec<String> = flatten(doc.root(), ROOT_PREFIX, &template)
            .iter()
            .map(FlatEntry::render)
            .collect();
        let second: Vec<String> = flatten(doc.root(), ROOT_PREFIX, &template)
            .iter()
            .map(FlatEntry::render)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_template() {
        let template: LineTemplate = "set %s %s".parse().unwrap();
        let doc = Document::parse(br#"{"a":"1"}"#).unwrap();
        let entries = flatten(doc.root(), ROOT_PREFIX, &template);
        assert_eq!(entries[0].render(), "set a 1");
        assert_eq!(entries[0].template().as_str(), "set %s %s");
    }

    #[test]
    fn test_template_requires_two_placeholders() {
        assert!(matches!(
            LineTemplate::new("%s only"),
            Err(InjectError::Template(_))
        ));
        assert!(matches!(
            LineTemplate::new("%s%s%s"),
            Err(InjectError::Template(_))
        ));
        assert!(LineTemplate::new(LineTemplate::ASH).is_ok());
    }
}
