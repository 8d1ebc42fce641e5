//! Structural search criteria
//!
//! A [`SearchCriteria`] is a set of field-path → expected-value pairs checked
//! against a raw payload before it is deserialized. All criteria must match;
//! an empty set matches every message.
//!
//! Values are compared as text: a JSON string by its content, numbers and
//! booleans by their JSON rendering, `null` by the literal `null`. Objects and
//! arrays never match a criterion.

use crate::path::{FieldPath, PathParseError};
use serde_json::Value as JsonValue;
use std::fmt;

/// One field-path → expected-value pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    /// Where to look in the payload
    pub path: FieldPath,
    /// Expected textual value
    pub expected: String,
}

/// Conjunction of structural criteria
///
/// ```
/// use duet_core::SearchCriteria;
/// use serde_json::json;
///
/// let criteria = SearchCriteria::new()
///     .with("accountId", "a-1").unwrap()
///     .with("legs[0].status", "OPEN").unwrap();
///
/// let payload = json!({"accountId": "a-1", "legs": [{"status": "OPEN"}]});
/// assert!(criteria.matches(&payload));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    criteria: Vec<Criterion>,
}

impl SearchCriteria {
    /// Empty criteria, matching everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a criterion, parsing the field path
    pub fn with(
        mut self,
        path: &str,
        expected: impl Into<String>,
    ) -> Result<Self, PathParseError> {
        let path: FieldPath = path.parse()?;
        self.insert(path, expected);
        Ok(self)
    }

    /// Add a criterion with an already-parsed path
    ///
    /// A second criterion on the same path replaces the first.
    pub fn insert(&mut self, path: FieldPath, expected: impl Into<String>) {
        let expected = expected.into();
        match self.criteria.iter_mut().find(|c| c.path == path) {
            Some(existing) => existing.expected = expected,
            None => self.criteria.push(Criterion { path, expected }),
        }
    }

    /// Build criteria from `(path, expected)` pairs
    pub fn from_pairs<'a, I, V>(pairs: I) -> Result<Self, PathParseError>
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .try_fold(Self::new(), |acc, (path, expected)| acc.with(path, expected))
    }

    /// Whether no criteria are set
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Number of criteria
    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    /// Iterate over the criteria
    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria.iter()
    }

    /// Check a decoded payload against every criterion
    pub fn matches(&self, payload: &JsonValue) -> bool {
        self.criteria.iter().all(|criterion| {
            criterion
                .path
                .lookup(payload)
                .is_some_and(|found| value_matches(found, &criterion.expected))
        })
    }

    /// Check raw payload bytes against every criterion
    ///
    /// Empty criteria short-circuit without parsing. Bytes that are not JSON
    /// never match non-empty criteria.
    pub fn matches_raw(&self, payload: &[u8]) -> bool {
        if self.is_empty() {
            return true;
        }
        match serde_json::from_slice::<JsonValue>(payload) {
            Ok(value) => self.matches(&value),
            Err(_) => false,
        }
    }
}

fn value_matches(found: &JsonValue, expected: &str) -> bool {
    match found {
        JsonValue::String(s) => s == expected,
        JsonValue::Number(n) => n.to_string() == expected,
        JsonValue::Bool(b) => b.to_string() == expected,
        JsonValue::Null => expected == "null",
        JsonValue::Array(_) | JsonValue::Object(_) => false,
    }
}

impl fmt::Display for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.criteria.is_empty() {
            return write!(f, "{{}}");
        }
        write!(f, "{{")?;
        for (i, c) in self.criteria.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", c.path, c.expected)?;
        }
        write!(f, "}}")
    }
}
