//! Familiar Documents
//!
//! Live, typed documents built from runtime schemas. A schema declares fields with
//! their types, defaults, transforms and validation rules; a document holds one
//! coerced, change-tracked, validatable value per field, including nested documents
//! and arrays of them, to any depth.
//!
//! ## Features
//!
//! - **Coercion**: every assignment is cast to the declared type; malformed input degrades
//!   to `null` instead of failing
//! - **Population**: one call turns a JSON tree into a typed document tree
//! - **Dirty Tracking**: `commit`, `rollback` and `is_changed` against a snapshot
//! - **Structural Operations**: `serialize`, `deep_clone`, `reset`, `clear`, `flatten`,
//!   `get_path`/`has_path`
//! - **Validation**: async rules per field, errors addressed by path and persisted on
//!   the fields, rehydratable with `apply_errors`
//!
//! ## Architecture
//!
//! ```text
//! Schema ──(shared)──► Document ──owns──► Field slots
//!                         ▲                  │
//!                         └──weak parent──── nested Document / [Document]
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let user = Schema::builder()
//!     .field("name", FieldDefinition::new(FieldType::string()).rule(Rule::new(presence())))
//!     .field("age", FieldDefinition::new(FieldType::integer()))
//!     .build();
//!
//! let doc = Document::new(json!({"age": "35"}), &user);
//! assert_eq!(doc.get("age"), Some(Value::from(35)));
//! let err = doc.validate().await.unwrap_err();
//! assert_eq!(err.paths, vec![path!["name"]]);
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod field;
pub mod logging;
pub mod path;
pub mod schema;
pub mod types;
pub mod validation;
pub mod value;

pub use config::EngineConfig;
pub use document::{Document, FlatField, PathTarget};
pub use error::{DocumentError, FieldError, ItemError, ModelError, RelatedErrors, Result};
pub use field::Field;
pub use path::{display_path, ErrorEntry, Path, PathSegment};
pub use schema::{FieldDefinition, Schema, SchemaBuilder, ValueSource, WeakSchema};
pub use types::{Caster, FieldType, TypeTable};
pub use validation::{
    validate_value, Rule, ValidateOptions, ValidationIssue, Validator, DEFAULT_ERROR_CODE,
};
pub use value::Value;
