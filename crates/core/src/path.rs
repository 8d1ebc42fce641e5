//! Field paths into raw JSON payloads
//!
//! A [`FieldPath`] addresses one value inside a decoded-but-untyped payload.
//! Paths drive the structural filter of a search: they are evaluated against
//! `serde_json::Value` before a message is deserialized into a domain type.
//!
//! # Path Syntax
//!
//! | Syntax | Meaning | Example |
//! |--------|---------|---------|
//! | `key` | Object property | `status` |
//! | `.key` | Object property (leading dot optional) | `.status` |
//! | `[n]` | Array index | `legs[0]` |
//! | `a.b` | Nested property | `bet.account_id` |
//! | (empty) | The whole payload | `` |

use serde_json::Value as JsonValue;
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for field path parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathParseError {
    /// Empty key in path
    #[error("empty key in path at position {0}")]
    EmptyKey(usize),
    /// Unclosed bracket
    #[error("unclosed bracket starting at position {0}")]
    UnclosedBracket(usize),
    /// Invalid array index
    #[error("invalid array index at position {0}: {1}")]
    InvalidIndex(usize, String),
    /// Unexpected character
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
}

/// A segment in a field path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object key: `.foo`
    Key(String),
    /// Array index: `[0]`
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, ".{}", k),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// A path into a JSON payload
///
/// Most criteria are one or two keys deep, so segments are kept inline.
///
/// ```
/// use duet_core::path::FieldPath;
///
/// let path: FieldPath = "legs[0].selectionId".parse().unwrap();
/// assert_eq!(path, FieldPath::root().key("legs").index(0).key("selectionId"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath {
    segments: SmallVec<[PathSegment; 4]>,
}

impl FieldPath {
    /// The empty path, addressing the whole payload
    pub fn root() -> Self {
        FieldPath {
            segments: SmallVec::new(),
        }
    }

    /// Get the path segments
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Number of segments in the path
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Check if this is the root path
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a key segment (builder pattern)
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Append an index segment (builder pattern)
    pub fn index(mut self, idx: usize) -> Self {
        self.segments.push(PathSegment::Index(idx));
        self
    }

    /// Resolve this path against a payload
    ///
    /// Returns `None` when a key is missing, an index is out of range, or a
    /// segment meets a value of the wrong shape.
    pub fn lookup<'a>(&self, value: &'a JsonValue) -> Option<&'a JsonValue> {
        let mut current = value;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Key(key), JsonValue::Object(obj)) => obj.get(key)?,
                (PathSegment::Index(idx), JsonValue::Array(arr)) => arr.get(*idx)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl FromStr for FieldPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, offset) = match s.strip_prefix('.') {
            Some(rest) => (rest, 1),
            None => (s, 0),
        };

        let mut path = FieldPath::root();
        if body.is_empty() {
            return Ok(path);
        }

        let mut at = offset;
        for component in body.split('.') {
            if component.is_empty() {
                return Err(PathParseError::EmptyKey(at));
            }
            parse_component(component, at, &mut path.segments)?;
            at += component.len() + 1;
        }
        Ok(path)
    }
}

/// One dot-separated component: an optional key, then any number of `[n]`
///
/// `at` is the byte offset of the component in the full path, for errors.
fn parse_component(
    component: &str,
    at: usize,
    segments: &mut SmallVec<[PathSegment; 4]>,
) -> Result<(), PathParseError> {
    let key_len = component
        .find(|c: char| !is_key_char(c))
        .unwrap_or(component.len());
    if key_len > 0 {
        segments.push(PathSegment::Key(component[..key_len].to_string()));
    }

    let mut rest = &component[key_len..];
    let mut pos = at + key_len;
    while let Some(c) = rest.chars().next() {
        let Some(inner) = rest.strip_prefix('[') else {
            return Err(PathParseError::UnexpectedChar(c, pos));
        };
        let close = inner
            .find(']')
            .ok_or(PathParseError::UnclosedBracket(pos))?;
        let digits = &inner[..close];
        let index = digits
            .parse::<usize>()
            .map_err(|_| PathParseError::InvalidIndex(pos + 1, digits.to_string()))?;
        segments.push(PathSegment::Index(index));

        rest = &inner[close + 1..];
        pos += close + 2;
    }
    Ok(())
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '$'
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(k) if i == 0 => write!(f, "{}", k)?,
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}
