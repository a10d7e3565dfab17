//! Reference parsing and fragment addressing.
//!
//! A reference points from one document into another:
//! `<relative path>#<fragment>`, where the fragment is a dot-separated
//! sequence of mapping keys and bracketed sequence indices, e.g.
//! `databases.[0].password`. Keys containing a literal dot are unaddressable
//! by design; see the store-level dotted-key validation.

use serde_yaml::value::Tag;
use serde_yaml::Value;

use crate::documents::DirKind;
use crate::errors::Error;

/// Which directory tree a reference resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// Non-sensitive shared values.
    Common,
    /// Secret values; uses are recorded for the audit stream.
    Secret,
}

impl RefKind {
    /// The directory tree this kind of reference reads from.
    pub fn dir_kind(self) -> DirKind {
        match self {
            RefKind::Common => DirKind::Common,
            RefKind::Secret => DirKind::Secrets,
        }
    }

    fn label(self) -> &'static str {
        match self {
            RefKind::Common => "common",
            RefKind::Secret => "secret",
        }
    }
}

/// A typed pointer from one document into another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Which tree the target document lives in.
    pub kind: RefKind,
    /// Path of the target document, relative to its tree root.
    pub target_path: String,
    /// Optional fragment addressing a node inside the target document.
    pub fragment: Option<String>,
}

impl Reference {
    /// Parse the body of a reference tag (`path` or `path#fragment`).
    pub fn parse(kind: RefKind, raw: &str) -> Self {
        match raw.split_once('#') {
            Some((path, fragment)) if !fragment.is_empty() => Self {
                kind,
                target_path: path.to_string(),
                fragment: Some(fragment.to_string()),
            },
            Some((path, _)) => Self {
                kind,
                target_path: path.to_string(),
                fragment: None,
            },
            None => Self {
                kind,
                target_path: raw.to_string(),
                fragment: None,
            },
        }
    }

    /// The identifier used in audit events and error messages, e.g.
    /// `db.yaml#[0].password`. Never includes resolved values.
    pub fn id(&self) -> String {
        match &self.fragment {
            Some(fragment) => format!("{}#{fragment}", self.target_path),
            None => self.target_path.clone(),
        }
    }

    /// Identifier qualified by kind, used as a cycle-detection key.
    pub fn qualified_id(&self) -> String {
        format!("{}:{}", self.kind.label(), self.id())
    }

    /// Address this reference's fragment inside the target document.
    pub fn address<'a>(&self, doc: &'a Value) -> Result<&'a Value, Error> {
        let Some(fragment) = &self.fragment else {
            return Ok(doc);
        };
        let mut node = doc;
        for token in fragment.split('.') {
            node = match parse_index(token) {
                Some(index) => node.as_sequence().and_then(|seq| seq.get(index)),
                None => {
                    let key = Value::String(token.to_string());
                    node.as_mapping().and_then(|m| m.get(&key))
                }
            }
            .ok_or_else(|| Error::UnresolvableReference {
                reference: self.id(),
            })?;
        }
        Ok(node)
    }
}

/// Parse a `[<int>]` fragment token into a sequence index.
fn parse_index(token: &str) -> Option<usize> {
    token
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|digits| digits.parse().ok())
}

/// Normalized tag name of a tagged YAML node, without the leading `!`.
pub fn tag_name(tag: &Tag) -> String {
    tag.to_string().trim_start_matches('!').to_string()
}
