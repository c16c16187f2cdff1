//! Documents: live instances of a schema
//!
//! A [`Document`] is a reference handle. Cloning the handle shares the instance;
//! [`Document::deep_clone`] copies the whole tree. Nested documents point back to the
//! document holding them through a weak link, so a tree is owned strictly top-down.

use futures::future::{FutureExt, LocalBoxFuture};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{DocumentError, ModelError, Result};
use crate::field::{Field, Slot};
use crate::path::{display_path, ErrorEntry, Path, PathSegment};
use crate::schema::Schema;
use crate::validation::ValidateOptions;
use crate::value::Value;

struct DocumentInner {
    schema: Schema,
    slots: RefCell<Vec<Slot>>,
    /// Keys accepted by a non-strict schema without a matching field
    extras: RefCell<IndexMap<String, Value>>,
    parent: RefCell<Weak<DocumentInner>>,
}

/// A field's position in a flattened document tree
#[derive(Debug, Clone)]
pub struct FlatField {
    pub path: Path,
    pub field: Field,
}

/// What a path resolves to
#[derive(Debug, Clone)]
pub enum PathTarget {
    Value(Value),
    /// Returned for a terminal `$name` segment
    Field(Field),
}

impl PathTarget {
    pub fn into_value(self) -> Option<Value> {
        match self {
            PathTarget::Value(value) => Some(value),
            PathTarget::Field(_) => None,
        }
    }

    pub fn into_field(self) -> Option<Field> {
        match self {
            PathTarget::Field(field) => Some(field),
            PathTarget::Value(_) => None,
        }
    }
}

/// Instance of a [`Schema`] holding one [`Field`] per declared field
#[derive(Clone)]
pub struct Document(Rc<DocumentInner>);

impl Document {
    /// Build a root document from raw data
    pub fn new(data: impl Into<Value>, schema: &Schema) -> Self {
        Self::with_parent(data, schema, None)
    }

    /// Build a document nested under `parent`.
    ///
    /// Every field starts at its default, which is also its initial snapshot; `data` is
    /// then populated on top.
    pub fn with_parent(data: impl Into<Value>, schema: &Schema, parent: Option<&Document>) -> Self {
        let doc = Self::empty(schema);
        doc.set_parent(parent);
        for field in doc.fields() {
            field.reset();
            field.snapshot();
        }
        doc.populate(data);
        doc
    }

    fn empty(schema: &Schema) -> Self {
        let slots = (0..schema.len()).map(|_| Slot::default()).collect();
        Document(Rc::new(DocumentInner {
            schema: schema.clone(),
            slots: RefCell::new(slots),
            extras: RefCell::new(IndexMap::new()),
            parent: RefCell::new(Weak::new()),
        }))
    }

    pub fn schema(&self) -> &Schema {
        &self.0.schema
    }

    /// The document whose field holds this one
    pub fn parent(&self) -> Option<Document> {
        self.0.parent.borrow().upgrade().map(Document)
    }

    /// Topmost ancestor, or `self` at the root
    pub fn root(&self) -> Document {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn set_parent(&self, parent: Option<&Document>) {
        *self.0.parent.borrow_mut() = parent.map(|p| Rc::downgrade(&p.0)).unwrap_or_default();
    }

    /// Whether `doc` is this document or one of its ancestors
    pub(crate) fn lineage_contains(&self, doc: &Document) -> bool {
        let mut current = Some(self.clone());
        while let Some(candidate) = current {
            if candidate.ptr_eq(doc) {
                return true;
            }
            current = candidate.parent();
        }
        false
    }

    pub(crate) fn adopt(&self, child: &Document) {
        child.set_parent(Some(self));
    }

    pub(crate) fn release(&self, child: &Document) {
        if child.parent().map_or(false, |parent| parent.ptr_eq(self)) {
            child.set_parent(None);
        }
    }

    /// Take `child` out of every slot of this document, leaving `null` behind
    pub(crate) fn detach(&self, child: &Document) {
        for slot in self.0.slots.borrow_mut().iter_mut() {
            if matches!(&slot.value, Value::Document(doc) if doc.ptr_eq(child)) {
                slot.value = Value::Null;
            } else if let Value::Array(items) = &mut slot.value {
                for item in items.iter_mut() {
                    if matches!(item, Value::Document(doc) if doc.ptr_eq(child)) {
                        *item = Value::Null;
                    }
                }
            }
        }
    }

    pub(crate) fn with_slot<R>(&self, index: usize, f: impl FnOnce(&Slot) -> R) -> R {
        f(&self.0.slots.borrow()[index])
    }

    pub(crate) fn with_slot_mut<R>(&self, index: usize, f: impl FnOnce(&mut Slot) -> R) -> R {
        f(&mut self.0.slots.borrow_mut()[index])
    }

    /// The `$name` accessor
    pub fn field(&self, name: &str) -> Option<Field> {
        self.schema()
            .index_of(name)
            .map(|index| Field::new(self.clone(), index))
    }

    /// All fields in schema order
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        (0..self.schema().len()).map(move |index| Field::new(self.clone(), index))
    }

    /// Value of a declared field, or of an extra key kept by a non-strict schema.
    /// `None` when the name is neither.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.field(name) {
            Some(field) => Some(field.value()),
            None => self.0.extras.borrow().get(name).cloned(),
        }
    }

    /// Assign a declared field, or keep an extra key on a non-strict schema
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        match self.field(name) {
            Some(field) => field.set_value(value),
            None if self.schema().strict() => {
                return Err(ModelError::UnknownField {
                    name: name.to_string(),
                });
            }
            None => {
                self.0.extras.borrow_mut().insert(name.to_string(), value.into());
            }
        }
        Ok(())
    }

    /// Assign every key of `data` through its field. Keys without a field are dropped
    /// by strict schemas and kept as extras otherwise.
    pub fn populate(&self, data: impl Into<Value>) {
        let data = match data.into() {
            Value::Document(doc) => Value::from(doc.serialize()),
            other => other,
        };
        let entries = match data {
            Value::Object(entries) => entries,
            Value::Null => return,
            other => {
                tracing::debug!(?other, "populate ignored non-object data");
                return;
            }
        };

        for (key, value) in entries {
            match self.field(&key) {
                Some(field) => field.set_value(value),
                None if self.schema().strict() => {
                    tracing::trace!(key = %key, "strict schema ignored unknown key");
                }
                None => {
                    tracing::debug!(key = %key, "keeping unknown key");
                    self.0.extras.borrow_mut().insert(key, value);
                }
            }
        }
    }

    /// Plain data tree of the declared fields
    pub fn serialize(&self) -> serde_json::Value {
        let map = self
            .fields()
            .map(|field| (field.name().to_string(), field.value().to_json()))
            .collect();
        serde_json::Value::Object(map)
    }

    pub fn reset(&self) {
        for field in self.fields() {
            field.reset();
        }
        self.invalidate();
    }

    /// Set every field to `null`
    pub fn clear(&self) {
        for field in self.fields() {
            field.clear();
        }
        self.invalidate();
    }

    /// Set every field to its fake value
    pub fn fake(&self) {
        for field in self.fields() {
            field.fake();
        }
        self.invalidate();
    }

    pub fn commit(&self) {
        for field in self.fields() {
            field.commit();
        }
    }

    pub fn rollback(&self) {
        for field in self.fields() {
            field.rollback();
        }
    }

    pub fn is_changed(&self) -> bool {
        self.fields().any(|field| field.is_changed())
    }

    pub fn is_nested(&self) -> bool {
        self.schema().is_nested()
    }

    /// Structural equality with another document or a raw data tree
    pub fn equals(&self, other: impl Into<Value>) -> bool {
        self.serialize() == other.into().to_json()
    }

    /// Independent copy of the whole tree: values, snapshots, errors and extras.
    /// The copy is a root.
    pub fn deep_clone(&self) -> Document {
        let copy = Self::empty(self.schema());
        let slots: Vec<Slot> = self.0.slots.borrow().clone();
        for (index, slot) in slots.into_iter().enumerate() {
            let value = slot.value.deep_copy();
            for nested in value.documents() {
                copy.adopt(&nested);
            }
            let initial = slot.initial.deep_copy();
            copy.with_slot_mut(index, |target| {
                target.value = value;
                target.initial = initial;
                target.errors = slot.errors;
                target.item_errors = slot.item_errors;
            });
        }
        let extras: IndexMap<String, Value> = self
            .0
            .extras
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.deep_copy()))
            .collect();
        *copy.0.extras.borrow_mut() = extras;
        copy
    }

    /// Every field of the tree, depth-first in schema order.
    ///
    /// Non-null nested documents are expanded under their field's path; elements of
    /// document arrays under `[field, index]`.
    pub fn flatten(&self) -> std::vec::IntoIter<FlatField> {
        let mut out = Vec::new();
        self.flatten_into(&[], &mut out);
        out.into_iter()
    }

    fn flatten_into(&self, prefix: &[PathSegment], out: &mut Vec<FlatField>) {
        for field in self.fields() {
            let mut path = prefix.to_vec();
            path.push(PathSegment::Key(field.name().to_string()));
            let value = field.raw_value();
            out.push(FlatField {
                path: path.clone(),
                field,
            });

            match value {
                Value::Document(nested) => nested.flatten_into(&path, out),
                Value::Array(items) => {
                    for (index, item) in items.iter().enumerate() {
                        if let Value::Document(nested) = item {
                            let mut item_path = path.clone();
                            item_path.push(PathSegment::Index(index));
                            nested.flatten_into(&item_path, out);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Resolve `path` to a value, or to a field when the last segment is `$name`.
    ///
    /// `None` when the path leaves the declared structure or passes through a `null`.
    pub fn get_path(&self, path: &[PathSegment]) -> Option<PathTarget> {
        let (head, rest) = path.split_first()?;
        let key = head.as_key()?;

        if let Some(name) = key.strip_prefix('$') {
            if !rest.is_empty() {
                return None;
            }
            return self.field(name).map(PathTarget::Field);
        }

        let value = self.field(key)?.value();
        resolve(value, rest)
    }

    /// Whether `path` is declared by the schema, whatever the current values are
    pub fn has_path(&self, path: &[PathSegment]) -> bool {
        self.schema().has_path(path)
    }

    /// The field at `path`, with or without a `$` on the last name
    pub fn field_at(&self, path: &[PathSegment]) -> Option<Field> {
        let (last, init) = path.split_last()?;
        let name = last.as_key()?;
        let name = name.strip_prefix('$').unwrap_or(name);
        let mut target = init.to_vec();
        target.push(PathSegment::Key(format!("${}", name)));
        self.get_path(&target)?.into_field()
    }

    /// Validate the whole tree, record errors on every field and fail with the
    /// collected paths.
    pub async fn validate(&self) -> std::result::Result<(), DocumentError> {
        self.validate_with(ValidateOptions::default()).await
    }

    /// Like [`Document::validate`]; with `quiet` the errors are only recorded.
    pub async fn validate_with(
        &self,
        options: ValidateOptions,
    ) -> std::result::Result<(), DocumentError> {
        match self.validate_tree().await {
            Some(error) if !options.quiet => Err(error),
            _ => Ok(()),
        }
    }

    /// Validate every field in order, persisting each field's own errors
    pub(crate) fn validate_tree(&self) -> LocalBoxFuture<'_, Option<DocumentError>> {
        async move {
            let mut paths = Vec::new();
            let mut errors = Vec::new();

            for field in self.fields() {
                match field.validate().await {
                    Ok(()) => {
                        field.set_errors(Vec::new());
                        field.set_item_errors(Vec::new());
                    }
                    Err(error) => {
                        field.set_errors(error.errors.clone());
                        field.set_item_errors(error.item_issues());
                        paths.extend(error.paths());
                        errors.push(error);
                    }
                }
            }

            if errors.is_empty() {
                return None;
            }
            tracing::debug!(
                failed = paths.len(),
                first = %display_path(&paths[0]),
                "document validation failed"
            );
            Some(DocumentError { paths, errors })
        }
        .boxed_local()
    }

    /// Drop recorded errors throughout the tree
    pub fn invalidate(&self) {
        for field in self.fields() {
            field.invalidate();
        }
    }

    /// Fields anywhere in the tree that carry errors, in flatten order. Issues of plain
    /// array elements follow their field as `[name, index]` entries.
    pub fn collect_errors(&self) -> Vec<ErrorEntry> {
        let mut entries = Vec::new();
        for flat in self.flatten() {
            let errors = flat.field.errors();
            let items = flat.field.item_errors();
            if !errors.is_empty() {
                entries.push(ErrorEntry {
                    path: flat.path.clone(),
                    errors,
                });
            }
            for (index, errors) in items.into_iter().filter(|(_, e)| !e.is_empty()) {
                let mut path = flat.path.clone();
                path.push(PathSegment::Index(index));
                entries.push(ErrorEntry { path, errors });
            }
        }
        entries
    }

    /// Record externally produced errors, e.g. a server's validation report.
    /// Entries whose path does not resolve to a field are skipped.
    pub fn apply_errors(&self, entries: &[ErrorEntry]) {
        for entry in entries {
            if let Some(field) = self.field_at(&entry.path) {
                field.set_errors(entry.errors.clone());
                continue;
            }
            match self.element_at(&entry.path) {
                Some((field, index)) => field.set_item_error(index, entry.errors.clone()),
                None => tracing::warn!(
                    path = %display_path(&entry.path),
                    "no field at path, errors not applied"
                ),
            }
        }
    }

    /// The array field and index addressed by a path ending in an index of a plain element
    fn element_at(&self, path: &[PathSegment]) -> Option<(Field, usize)> {
        let (PathSegment::Index(index), init) = path.split_last()? else {
            return None;
        };
        let field = self.field_at(init)?;
        let is_plain_element = match field.raw_value() {
            Value::Array(items) => items
                .get(*index)
                .map_or(false, |item| !item.is_null() && item.as_document().is_none()),
            _ => false,
        };
        is_plain_element.then_some((field, *index))
    }

    pub fn has_errors(&self) -> bool {
        self.flatten().any(|flat| flat.field.has_errors())
    }

    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }
}

fn resolve(value: Value, rest: &[PathSegment]) -> Option<PathTarget> {
    let Some((segment, tail)) = rest.split_first() else {
        return Some(PathTarget::Value(value));
    };
    match (value, segment) {
        (Value::Document(nested), PathSegment::Key(_)) => nested.get_path(rest),
        (Value::Array(items), PathSegment::Index(index)) => {
            resolve(items.into_iter().nth(*index)?, tail)
        }
        (Value::Object(mut map), PathSegment::Key(key)) => resolve(map.shift_remove(key)?, tail),
        _ => None,
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("data", &self.serialize())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use crate::schema::FieldDefinition;
    use crate::types::FieldType;
    use serde_json::json;

    fn book() -> Schema {
        Schema::builder()
            .field("title", FieldDefinition::new(FieldType::string()))
            .build()
    }

    fn user() -> Schema {
        let book = book();
        Schema::builder()
            .field("name", FieldDefinition::new(FieldType::string()))
            .field("book", FieldDefinition::new(FieldType::schema(&book)))
            .field("books", FieldDefinition::new(FieldType::array_of(FieldType::schema(&book))))
            .build()
    }

    #[test]
    fn test_nested_documents_link_to_parent() {
        let doc = Document::new(json!({"book": {"title": 100}}), &user());
        let book = doc.get("book").and_then(|v| v.as_document().cloned()).unwrap();
        assert_eq!(book.get("title"), Some(Value::from("100")));
        assert!(book.parent().unwrap().ptr_eq(&doc));
        assert!(book.root().ptr_eq(&doc));
        assert!(doc.parent().is_none());
    }

    #[test]
    fn test_replacing_nested_document_releases_it() {
        let doc = Document::new(json!({"book": {"title": "A"}}), &user());
        let old = doc.get("book").and_then(|v| v.as_document().cloned()).unwrap();
        doc.set("book", json!({"title": "B"})).unwrap();
        assert!(old.parent().is_none());
    }

    #[test]
    fn test_reassignment_reparents() {
        let schema = user();
        let first = Document::new(json!({"book": {"title": "A"}}), &schema);
        let second = Document::new(json!({}), &schema);
        let book = first.get("book").and_then(|v| v.as_document().cloned()).unwrap();

        second.set("book", &book).unwrap();
        assert!(book.parent().unwrap().ptr_eq(&second));
        assert!(first.get("book").unwrap().is_null());
    }

    #[test]
    fn test_moving_an_array_element_leaves_a_null_slot() {
        let schema = user();
        let first = Document::new(json!({"books": [{"title": "A"}, {"title": "B"}]}), &schema);
        let second = Document::new(json!({}), &schema);
        let moved = first.get_path(&path!["books", 1]).and_then(PathTarget::into_value).unwrap();

        second.set("book", moved).unwrap();
        assert_eq!(first.serialize()["books"], json!([{"title": "A"}, null]));
        assert_eq!(second.serialize()["book"], json!({"title": "B"}));
    }

    #[test]
    fn test_untyped_values_cannot_hold_an_ancestor() {
        let schema = Schema::builder()
            .field("bag", FieldDefinition::new(FieldType::untyped_array()))
            .field("anything", FieldDefinition::new(FieldType::Any))
            .fields_with(|this| {
                vec![("child".to_string(), FieldDefinition::new(FieldType::recursive(this)))]
            })
            .build();
        let doc = Document::new(json!({"child": {}}), &schema);
        let child = doc.get("child").and_then(|v| v.as_document().cloned()).unwrap();

        doc.set("bag", vec![Value::from(&doc), Value::from("x")]).unwrap();
        assert_eq!(doc.serialize()["bag"], json!([null, "x"]));
        assert!(doc.parent().is_none());

        child.set("anything", &doc).unwrap();
        assert!(child.get("anything").unwrap().is_null());
        assert!(doc.root().ptr_eq(&doc));
    }

    #[test]
    fn test_document_cannot_nest_its_own_ancestor() {
        let node = Schema::builder()
            .fields_with(|this| {
                vec![("child".to_string(), FieldDefinition::new(FieldType::recursive(this)))]
            })
            .build();
        let doc = Document::new(json!({"child": {}}), &node);
        let child = doc.get("child").and_then(|v| v.as_document().cloned()).unwrap();

        doc.set("child", &doc).unwrap();
        assert!(doc.get("child").unwrap().is_null());

        let doc = Document::new(json!({"child": {}}), &node);
        let child_of_new = doc.get("child").and_then(|v| v.as_document().cloned()).unwrap();
        child_of_new.set("child", &doc).unwrap();
        assert!(child_of_new.get("child").unwrap().is_null());
        assert!(child.parent().is_none());
    }

    #[test]
    fn test_strict_set_rejects_unknown_field() {
        let doc = Document::new(json!({}), &user());
        let err = doc.set("age", 1).unwrap_err();
        assert!(matches!(err, ModelError::UnknownField { .. }));
    }

    #[test]
    fn test_get_path_returns_field_for_dollar_segment() {
        let doc = Document::new(json!({"books": [null, {"title": "A"}]}), &user());
        let field = doc.get_path(&path!["books", 1, "$title"]).and_then(PathTarget::into_field);
        assert_eq!(field.unwrap().value(), Value::from("A"));
        assert!(doc.get_path(&path!["books", 0, "title"]).is_none());
        assert!(doc.get_path(&path!["books", 0]).unwrap().into_value().unwrap().is_null());
        assert!(doc.field_at(&path!["books", 1, "title"]).is_some());
    }
}
