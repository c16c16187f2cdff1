//! Error types for documents and validation

use thiserror::Error;

use crate::path::{Path, PathSegment};
use crate::validation::ValidationIssue;

/// Result type for document operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that are not validation outcomes
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Unknown field: {name} is not declared by a strict schema")]
    UnknownField { name: String },

    #[error(transparent)]
    Invalid(#[from] DocumentError),

    #[error("Invalid JSON Schema: {0}")]
    InvalidJsonSchema(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Raised by `Document::validate` when any field in the tree is invalid.
///
/// `paths` lists every invalid field in depth-first schema order; `errors`
/// holds the per-field failures of the document's own fields.
#[derive(Error, Debug, Clone)]
#[error("document failed validation at {} path(s)", .paths.len())]
pub struct DocumentError {
    pub paths: Vec<Path>,
    pub errors: Vec<FieldError>,
}

impl DocumentError {
    /// Own issues reported for the field at `path`, if it is a direct field of this document
    /// or of a nested one.
    pub fn issues_at(&self, path: &[PathSegment]) -> Option<&[ValidationIssue]> {
        let (head, rest) = path.split_first()?;
        let PathSegment::Key(name) = head else {
            return None;
        };
        let field = self.errors.iter().find(|e| &e.name == name)?;
        if rest.is_empty() {
            return Some(&field.errors);
        }
        match (&field.related, rest.split_first()?) {
            (Some(RelatedErrors::Document(nested)), _) => nested.issues_at(rest),
            (Some(RelatedErrors::Items(items)), (PathSegment::Index(i), tail)) => {
                match items.get(*i)?.as_ref()? {
                    ItemError::Document(nested) => nested.issues_at(tail),
                    ItemError::Issues(issues) if tail.is_empty() => Some(issues),
                    ItemError::Issues(_) => None,
                }
            }
            _ => None,
        }
    }
}

/// One field's failure: its own issues plus whatever its nested content reported.
#[derive(Error, Debug, Clone)]
#[error("field `{name}` failed validation")]
pub struct FieldError {
    pub name: String,
    pub errors: Vec<ValidationIssue>,
    pub related: Option<RelatedErrors>,
}

/// Failures found below a field
#[derive(Debug, Clone)]
pub enum RelatedErrors {
    /// The nested document is invalid
    Document(DocumentError),
    /// Per-element outcome of an array value; `None` marks a valid or absent slot
    Items(Vec<Option<ItemError>>),
}

/// Failure of a single array element
#[derive(Debug, Clone)]
pub enum ItemError {
    /// A plain element failed the field's rules
    Issues(Vec<ValidationIssue>),
    /// A nested document element is invalid
    Document(DocumentError),
}

impl FieldError {
    /// Paths of this field and of every invalid location below it, relative to the
    /// owning document.
    pub fn paths(&self) -> Vec<Path> {
        let own = vec![PathSegment::Key(self.name.clone())];
        let mut paths = vec![own.clone()];

        match &self.related {
            Some(RelatedErrors::Document(nested)) => {
                paths.extend(nested.paths.iter().map(|p| prefixed(&own, p)));
            }
            Some(RelatedErrors::Items(items)) => {
                for (index, item) in items.iter().enumerate() {
                    let mut base = own.clone();
                    base.push(PathSegment::Index(index));
                    match item {
                        Some(ItemError::Document(nested)) => {
                            paths.extend(nested.paths.iter().map(|p| prefixed(&base, p)));
                        }
                        Some(ItemError::Issues(_)) => paths.push(base),
                        None => {}
                    }
                }
            }
            None => {}
        }

        paths
    }

    /// Issues of failing plain array elements, as `(index, issues)`
    pub fn item_issues(&self) -> Vec<(usize, Vec<ValidationIssue>)> {
        let Some(RelatedErrors::Items(items)) = &self.related else {
            return Vec::new();
        };
        items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| match item {
                Some(ItemError::Issues(issues)) => Some((index, issues.clone())),
                _ => None,
            })
            .collect()
    }
}

fn prefixed(prefix: &[PathSegment], path: &[PathSegment]) -> Path {
    prefix.iter().chain(path.iter()).cloned().collect()
}
