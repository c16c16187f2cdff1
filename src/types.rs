//! Type descriptors and value coercion
//!
//! A field's declared [`FieldType`] is resolved on every assignment into a cast:
//! scalar names go through the schema's [`TypeTable`], schema references build (or adopt)
//! nested documents, and array descriptors cast element-wise while keeping `null` slots.
//!
//! Casts never fail. Input that cannot be represented in the target type degrades to
//! `Null` and is left for validators to reject.

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde_json::Number;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::document::Document;
use crate::schema::{Schema, WeakSchema};
use crate::value::Value;

/// Coercion function for one named type
pub type Caster = Rc<dyn Fn(Value) -> Value>;

/// Declared type of a field
#[derive(Clone, Default)]
pub enum FieldType {
    /// No coercion
    #[default]
    Any,
    /// Built-in or custom scalar, looked up in the schema's [`TypeTable`]
    Scalar(String),
    /// Nested document of the given schema
    Schema(Schema),
    /// Nested document of a schema that refers back to itself
    Recursive(WeakSchema),
    /// Array of `T`, or an untyped array when `None`
    Array(Option<Box<FieldType>>),
}

impl FieldType {
    pub fn string() -> Self {
        Self::Scalar("string".to_string())
    }

    pub fn integer() -> Self {
        Self::Scalar("integer".to_string())
    }

    pub fn float() -> Self {
        Self::Scalar("float".to_string())
    }

    pub fn boolean() -> Self {
        Self::Scalar("boolean".to_string())
    }

    pub fn date() -> Self {
        Self::Scalar("date".to_string())
    }

    /// A custom type registered on the schema
    pub fn named(name: impl Into<String>) -> Self {
        Self::Scalar(name.into())
    }

    pub fn schema(schema: &Schema) -> Self {
        Self::Schema(schema.clone())
    }

    /// Reference to `schema` that does not keep it alive; used from inside the
    /// schema's own field thunk.
    pub fn recursive(schema: &Schema) -> Self {
        Self::Recursive(schema.downgrade())
    }

    pub fn array_of(inner: FieldType) -> Self {
        Self::Array(Some(Box::new(inner)))
    }

    pub fn untyped_array() -> Self {
        Self::Array(None)
    }

    /// The schema a nested document of this type is built from
    pub fn nested_schema(&self) -> Option<Schema> {
        match self {
            FieldType::Schema(schema) => Some(schema.clone()),
            FieldType::Recursive(weak) => weak.upgrade(),
            _ => None,
        }
    }

    /// Whether values of this type hold nested documents
    pub fn is_nested(&self) -> bool {
        match self {
            FieldType::Schema(_) | FieldType::Recursive(_) => true,
            FieldType::Array(Some(inner)) => inner.is_nested(),
            _ => false,
        }
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Any => write!(f, "Any"),
            FieldType::Scalar(name) => write!(f, "Scalar({})", name),
            FieldType::Schema(_) => write!(f, "Schema"),
            FieldType::Recursive(_) => write!(f, "Recursive"),
            FieldType::Array(None) => write!(f, "Array"),
            FieldType::Array(Some(inner)) => write!(f, "Array({:?})", inner),
        }
    }
}

/// Named casters: the built-ins merged with a schema's custom types
#[derive(Clone)]
pub struct TypeTable {
    casters: HashMap<String, Caster>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TypeTable {
    /// `string`, `integer`, `float`/`number`, `boolean`, `date` and `any`
    pub fn builtin() -> Self {
        let mut table = Self {
            casters: HashMap::new(),
        };
        table.register("string", cast_string);
        table.register("integer", cast_integer);
        table.register("float", cast_float);
        table.register("number", cast_float);
        table.register("boolean", cast_boolean);
        table.register("date", cast_date);
        table.register("any", |value| value);
        table
    }

    /// Add or replace a caster
    pub fn register(&mut self, name: impl Into<String>, caster: impl Fn(Value) -> Value + 'static) {
        self.casters.insert(name.into(), Rc::new(caster));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.casters.contains_key(name)
    }

    /// Cast through the caster registered as `name`; unknown names leave the value as is.
    pub fn cast(&self, name: &str, value: Value) -> Value {
        match self.casters.get(name) {
            Some(caster) => caster(value),
            None => {
                tracing::warn!(type_name = name, "unknown type, value left uncoerced");
                value
            }
        }
    }
}

/// Coerce `value` into `field_type` on behalf of `owner`.
///
/// Nested documents built here get `owner` as their parent; documents passed in are
/// adopted when the value is stored.
pub(crate) fn cast(value: Value, field_type: &FieldType, owner: &Document) -> Value {
    match field_type {
        FieldType::Any => value,
        FieldType::Scalar(name) => owner.schema().types().cast(name, value),
        FieldType::Schema(_) | FieldType::Recursive(_) => match field_type.nested_schema() {
            Some(schema) => cast_document(value, &schema, owner),
            None => {
                tracing::warn!("nested schema dropped, value discarded");
                Value::Null
            }
        },
        FieldType::Array(inner) => match to_array(value) {
            Value::Array(items) => match inner {
                Some(inner) => Value::Array(
                    items
                        .into_iter()
                        .map(|item| match item {
                            Value::Null => Value::Null,
                            item => cast(item, inner, owner),
                        })
                        .collect(),
                ),
                None => Value::Array(items),
            },
            other => other,
        },
    }
}

fn to_array(value: Value) -> Value {
    match value {
        Value::Null | Value::Array(_) => value,
        other => Value::Array(vec![other]),
    }
}

fn cast_document(value: Value, schema: &Schema, owner: &Document) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Document(doc) if owner.lineage_contains(&doc) => {
            tracing::warn!("refusing to nest a document inside itself");
            Value::Null
        }
        Value::Document(doc) if doc.schema().ptr_eq(schema) => Value::Document(doc),
        Value::Document(doc) => Value::Document(Document::with_parent(
            Value::from(doc.serialize()),
            schema,
            Some(owner),
        )),
        data @ Value::Object(_) => Value::Document(Document::with_parent(data, schema, Some(owner))),
        other => {
            tracing::trace!(?other, "value is not an object, nested document left empty");
            Value::Null
        }
    }
}

fn cast_string(value: Value) -> Value {
    match value {
        Value::Null | Value::String(_) => value,
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Number(n) => Value::String(n.to_string()),
        other => Value::String(other.to_json().to_string()),
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn cast_integer(value: Value) -> Value {
    if matches!(&value, Value::Number(n) if n.is_i64() || n.is_u64()) {
        return value;
    }
    let float = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    match float.map(f64::trunc) {
        Some(n) if n >= i64::MIN as f64 && n <= i64::MAX as f64 => Value::Number((n as i64).into()),
        _ => Value::Null,
    }
}

fn cast_float(value: Value) -> Value {
    let float = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    float
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn cast_boolean(value: Value) -> Value {
    match value {
        Value::Null | Value::Bool(_) => value,
        Value::Number(n) => Value::Bool(n.as_f64().map_or(false, |n| n != 0.0)),
        Value::String(s) => {
            let falsy = matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "" | "0" | "false" | "no" | "n" | "off"
            );
            Value::Bool(!falsy)
        }
        _ => Value::Null,
    }
}

fn cast_date(value: Value) -> Value {
    let parsed: Option<DateTime<Utc>> = match &value {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                        .map(|naive| Utc.from_utc_datetime(&naive))
                })
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    };
    parsed
        .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
        .unwrap_or(Value::Null)
}
