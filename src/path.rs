//! Paths addressing fields and values inside a document tree

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::validation::ValidationIssue;

/// Ordered sequence of field names and array indices
pub type Path = Vec<PathSegment>;

/// One step of a [`Path`]
///
/// Serializes untagged: names as strings, indices as numbers, so a path reads
/// `["books", 1, "title"]` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathSegment::Key(key) => Some(key),
            PathSegment::Index(_) => None,
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// Render a path as `books[1].title`
pub fn display_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        if matches!(segment, PathSegment::Key(_)) && !out.is_empty() {
            out.push('.');
        }
        out.push_str(&segment.to_string());
    }
    out
}

/// Build a [`Path`] from names and indices: `path!["books", 1, "title"]`
#[macro_export]
macro_rules! path {
    ($($segment:expr),* $(,)?) => {
        {
            let path: $crate::Path = vec![$($crate::PathSegment::from($segment)),*];
            path
        }
    };
}

/// Validation issues recorded on the field at `path`.
///
/// Produced by `Document::collect_errors` and consumed by `Document::apply_errors`,
/// so a report serialized on one side can be rehydrated on the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub path: Path,
    pub errors: Vec<ValidationIssue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(&path!["books", 1, "title"]), "books[1].title");
        assert_eq!(display_path(&path!["name"]), "name");
        assert_eq!(display_path(&[]), "");
    }

    #[test]
    fn test_error_entry_wire_format() {
        let json = r#"{"path":["books",0,"title"],"errors":[{"validator":"presence","message":"is required","code":422}]}"#;
        let entry: ErrorEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.path, path!["books", 0, "title"]);
        assert_eq!(entry.errors[0].code, 422);
        assert_eq!(serde_json::to_string(&entry).unwrap(), json);
    }
}
