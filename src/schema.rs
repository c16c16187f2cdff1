//! Schema types and structures
//!
//! A [`Schema`] is an ordered table of [`FieldDefinition`]s plus a strictness flag and a
//! [`TypeTable`]. It is shared read-only by every document built from it.
//!
//! Field tables may be supplied as a thunk that receives the schema under construction,
//! which is how a schema nests itself:
//!
//! ```ignore
//! let category = Schema::builder()
//!     .field("name", FieldDefinition::new(FieldType::string()))
//!     .fields_with(|this| vec![(
//!         "children".to_string(),
//!         FieldDefinition::new(FieldType::array_of(FieldType::recursive(this))),
//!     )])
//!     .build();
//! ```

use indexmap::IndexMap;
use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::config::SchemaDefaults;
use crate::document::Document;
use crate::path::PathSegment;
use crate::types::{FieldType, TypeTable};
use crate::validation::Rule;
use crate::value::Value;

/// Transform applied by a field's getter or setter
pub type Transform = Rc<dyn Fn(&Document, Value) -> Value>;

/// Generator for default and fake values
pub type Generator = Rc<dyn Fn(&Document) -> Value>;

type FieldsThunk = Box<dyn FnOnce(&Schema) -> Vec<(String, FieldDefinition)>>;

/// Literal or generated source of a field's default/fake value
#[derive(Clone)]
pub enum ValueSource {
    Literal(Value),
    Generator(Generator),
}

impl ValueSource {
    /// Literals are deep-copied so documents never share them.
    pub(crate) fn resolve(&self, document: &Document) -> Value {
        match self {
            ValueSource::Literal(value) => value.deep_copy(),
            ValueSource::Generator(generate) => generate(document),
        }
    }
}

/// Declaration of one schema field
#[derive(Clone, Default)]
pub struct FieldDefinition {
    pub field_type: FieldType,
    pub default_value: Option<ValueSource>,
    pub fake_value: Option<ValueSource>,
    pub get: Option<Transform>,
    pub set: Option<Transform>,
    pub validate: Vec<Rule>,
}

impl FieldDefinition {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Self::default()
        }
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(ValueSource::Literal(value.into()));
        self
    }

    pub fn default_with(mut self, generate: impl Fn(&Document) -> Value + 'static) -> Self {
        self.default_value = Some(ValueSource::Generator(Rc::new(generate)));
        self
    }

    pub fn fake_value(mut self, value: impl Into<Value>) -> Self {
        self.fake_value = Some(ValueSource::Literal(value.into()));
        self
    }

    pub fn fake_with(mut self, generate: impl Fn(&Document) -> Value + 'static) -> Self {
        self.fake_value = Some(ValueSource::Generator(Rc::new(generate)));
        self
    }

    pub fn getter(mut self, transform: impl Fn(&Document, Value) -> Value + 'static) -> Self {
        self.get = Some(Rc::new(transform));
        self
    }

    pub fn setter(mut self, transform: impl Fn(&Document, Value) -> Value + 'static) -> Self {
        self.set = Some(Rc::new(transform));
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.validate.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.validate.extend(rules);
        self
    }
}

impl fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("field_type", &self.field_type)
            .field("has_default", &self.default_value.is_some())
            .field("has_fake", &self.fake_value.is_some())
            .field("rules", &self.validate.len())
            .finish()
    }
}

struct PendingFields {
    fields: Vec<(String, FieldDefinition)>,
    thunk: Option<FieldsThunk>,
}

struct SchemaInner {
    fields: OnceCell<IndexMap<String, FieldDefinition>>,
    pending: RefCell<Option<PendingFields>>,
    strict: bool,
    types: TypeTable,
}

/// Shared, immutable document schema
#[derive(Clone)]
pub struct Schema(Rc<SchemaInner>);

/// Non-owning reference to a [`Schema`]
#[derive(Clone)]
pub struct WeakSchema(Weak<SchemaInner>);

impl WeakSchema {
    pub fn upgrade(&self) -> Option<Schema> {
        self.0.upgrade().map(Schema)
    }
}

impl Schema {
    /// Start a strict schema with the built-in types
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Start a schema using configured defaults
    pub fn builder_with(defaults: &SchemaDefaults) -> SchemaBuilder {
        SchemaBuilder::default().strict(defaults.strict)
    }

    /// Ordered field table, resolved from the thunk on first access.
    ///
    /// The thunk must not read the table of the schema it is building.
    pub fn fields(&self) -> &IndexMap<String, FieldDefinition> {
        self.0.fields.get_or_init(|| {
            let pending = self.0.pending.borrow_mut().take();
            let mut table = IndexMap::new();
            if let Some(PendingFields { fields, thunk }) = pending {
                table.extend(fields);
                if let Some(thunk) = thunk {
                    table.extend(thunk(self));
                }
            }
            table
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields().get(name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields().get_index_of(name)
    }

    pub fn field_at(&self, index: usize) -> Option<(&str, &FieldDefinition)> {
        self.fields()
            .get_index(index)
            .map(|(name, def)| (name.as_str(), def))
    }

    pub fn len(&self) -> usize {
        self.fields().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Whether `populate` ignores keys without a field
    pub fn strict(&self) -> bool {
        self.0.strict
    }

    pub fn types(&self) -> &TypeTable {
        &self.0.types
    }

    /// True if any field holds nested documents
    pub fn is_nested(&self) -> bool {
        self.fields().values().any(|def| def.field_type.is_nested())
    }

    /// Whether `path` is declared by this schema, independent of any document's values.
    ///
    /// Names must be declared fields; an index may follow an array field; a name may
    /// follow a nested-schema field or an index into an array of documents.
    pub fn has_path(&self, path: &[PathSegment]) -> bool {
        let Some((PathSegment::Key(key), rest)) = path.split_first() else {
            return false;
        };
        let name = key.strip_prefix('$').unwrap_or(key);
        match self.field(name) {
            Some(def) => declares(&def.field_type, rest),
            None => false,
        }
    }

    pub fn downgrade(&self) -> WeakSchema {
        WeakSchema(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Schema) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

fn declares(field_type: &FieldType, rest: &[PathSegment]) -> bool {
    match rest.split_first() {
        None => true,
        Some((PathSegment::Index(_), tail)) => match field_type {
            FieldType::Array(Some(inner)) => declares(inner, tail),
            FieldType::Array(None) => tail.is_empty(),
            _ => false,
        },
        Some((PathSegment::Key(_), _)) => field_type
            .nested_schema()
            .map_or(false, |schema| schema.has_path(rest)),
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Field names only: recursive schemas would otherwise print forever.
        let names: Vec<&str> = match self.0.fields.get() {
            Some(fields) => fields.keys().map(String::as_str).collect(),
            None => Vec::new(),
        };
        f.debug_struct("Schema")
            .field("fields", &names)
            .field("strict", &self.0.strict)
            .finish()
    }
}

/// Builder for [`Schema`]
pub struct SchemaBuilder {
    fields: Vec<(String, FieldDefinition)>,
    thunk: Option<FieldsThunk>,
    strict: bool,
    types: TypeTable,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            thunk: None,
            strict: true,
            types: TypeTable::builtin(),
        }
    }
}

impl SchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, definition: FieldDefinition) -> Self {
        self.fields.push((name.into(), definition));
        self
    }

    /// Fields declared lazily, after the schema handle exists. They follow any fields
    /// added with [`SchemaBuilder::field`].
    pub fn fields_with(
        mut self,
        thunk: impl FnOnce(&Schema) -> Vec<(String, FieldDefinition)> + 'static,
    ) -> Self {
        self.thunk = Some(Box::new(thunk));
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Register a custom type, or override a built-in one
    pub fn type_caster(
        mut self,
        name: impl Into<String>,
        caster: impl Fn(Value) -> Value + 'static,
    ) -> Self {
        self.types.register(name, caster);
        self
    }

    pub fn build(self) -> Schema {
        Schema(Rc::new(SchemaInner {
            fields: OnceCell::new(),
            pending: RefCell::new(Some(PendingFields {
                fields: self.fields,
                thunk: self.thunk,
            })),
            strict: self.strict,
            types: self.types,
        }))
    }
}
