//! Per-document field handles
//!
//! A [`Field`] is a handle to one slot of one document: the slot's state lives inside
//! the [`Document`], the handle only knows the owner and the slot index.

use std::fmt;

use crate::document::Document;
use crate::error::{FieldError, ItemError, RelatedErrors};
use crate::schema::FieldDefinition;
use crate::types::cast;
use crate::validation::{validate_value, ValidationIssue};
use crate::value::Value;

/// State of one field on one document
#[derive(Debug, Clone, Default)]
pub(crate) struct Slot {
    pub value: Value,
    pub initial: Value,
    pub errors: Vec<ValidationIssue>,
    /// Issues of failing plain array elements, by index
    pub item_errors: Vec<(usize, Vec<ValidationIssue>)>,
}

/// Typed, change-tracked, validatable value slot
#[derive(Clone)]
pub struct Field {
    document: Document,
    index: usize,
}

impl Field {
    pub(crate) fn new(document: Document, index: usize) -> Self {
        Self { document, index }
    }

    fn entry(&self) -> (&str, &FieldDefinition) {
        self.document
            .schema()
            .field_at(self.index)
            .unwrap_or_else(|| unreachable!("slot {} has no definition", self.index))
    }

    pub fn name(&self) -> &str {
        self.entry().0
    }

    pub fn definition(&self) -> &FieldDefinition {
        self.entry().1
    }

    /// The document owning this field
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Current value, passed through the definition's getter
    pub fn value(&self) -> Value {
        let raw = self.raw_value();
        match &self.definition().get {
            Some(get) => get(&self.document, raw),
            None => raw,
        }
    }

    /// Stored value without the getter
    pub fn raw_value(&self) -> Value {
        self.document.with_slot(self.index, |slot| slot.value.clone())
    }

    /// Coerce `value` to the declared type, apply the setter and store the result.
    /// Errors from the previous validation are discarded.
    pub fn set_value(&self, value: impl Into<Value>) {
        let value = self.prepare(value.into());
        self.store(value);
    }

    /// Snapshot from construction or the last `commit`
    pub fn initial_value(&self) -> Value {
        self.document.with_slot(self.index, |slot| slot.initial.clone())
    }

    /// The default, coerced as an assignment would be. `Null` when no default is declared.
    pub fn default_value(&self) -> Value {
        let raw = self
            .definition()
            .default_value
            .as_ref()
            .map(|source| source.resolve(&self.document))
            .unwrap_or_default();
        self.prepare(raw)
    }

    /// The fake value, coerced as an assignment would be. `Null` when no generator is declared.
    pub fn fake_value(&self) -> Value {
        let raw = self
            .definition()
            .fake_value
            .as_ref()
            .map(|source| source.resolve(&self.document))
            .unwrap_or_default();
        self.prepare(raw)
    }

    pub fn reset(&self) {
        self.store(self.default_value());
    }

    /// Set to `null`, bypassing the default
    pub fn clear(&self) {
        self.set_value(Value::Null);
    }

    pub fn fake(&self) {
        self.store(self.fake_value());
    }

    /// Commit nested documents, then snapshot the current value.
    pub fn commit(&self) {
        let value = self.raw_value();
        for nested in value.documents() {
            nested.commit();
        }
        self.snapshot();
    }

    pub(crate) fn snapshot(&self) {
        let snapshot = self.raw_value().deep_copy();
        self.document
            .with_slot_mut(self.index, |slot| slot.initial = snapshot);
    }

    /// Restore the last snapshot. The stored snapshot is copied, not re-coerced,
    /// so setters are not applied a second time.
    pub fn rollback(&self) {
        let restored = self.initial_value().deep_copy();
        self.store(restored);
    }

    /// Structural equality between the stored value and `data`
    pub fn equals(&self, data: impl Into<Value>) -> bool {
        self.raw_value().deep_eq(&data.into())
    }

    pub fn is_changed(&self) -> bool {
        !self.equals(self.initial_value())
    }

    /// Issues recorded by the last validation or `apply_errors`
    pub fn errors(&self) -> Vec<ValidationIssue> {
        self.document.with_slot(self.index, |slot| slot.errors.clone())
    }

    pub fn set_errors(&self, errors: Vec<ValidationIssue>) {
        self.document
            .with_slot_mut(self.index, |slot| slot.errors = errors);
    }

    /// Issues recorded against plain elements of an array value, as `(index, issues)`
    pub fn item_errors(&self) -> Vec<(usize, Vec<ValidationIssue>)> {
        self.document
            .with_slot(self.index, |slot| slot.item_errors.clone())
    }

    pub fn set_item_errors(&self, item_errors: Vec<(usize, Vec<ValidationIssue>)>) {
        self.document
            .with_slot_mut(self.index, |slot| slot.item_errors = item_errors);
    }

    /// Record issues for one array element, replacing any already recorded for it
    pub fn set_item_error(&self, index: usize, errors: Vec<ValidationIssue>) {
        self.document.with_slot_mut(self.index, |slot| {
            slot.item_errors.retain(|(i, _)| *i != index);
            slot.item_errors.push((index, errors));
            slot.item_errors.sort_by_key(|(i, _)| *i);
        });
    }

    /// Own issues or element issues are recorded
    pub fn has_errors(&self) -> bool {
        self.document.with_slot(self.index, |slot| {
            !slot.errors.is_empty() || slot.item_errors.iter().any(|(_, e)| !e.is_empty())
        })
    }

    /// No own errors and every nested document valid
    pub fn is_valid(&self) -> bool {
        !self.has_errors() && self.raw_value().documents().iter().all(Document::is_valid)
    }

    /// Clear errors here and on nested documents; the value is untouched.
    pub fn invalidate(&self) {
        self.document.with_slot_mut(self.index, |slot| {
            slot.errors.clear();
            slot.item_errors.clear();
        });
        for nested in self.raw_value().documents() {
            nested.invalidate();
        }
    }

    /// Run this field's rules against its value and recurse into nested content.
    ///
    /// Nested documents persist their own errors while recursing; this field's errors
    /// are left for the owning document to record.
    pub async fn validate(&self) -> Result<(), FieldError> {
        let value = self.value();
        let errors = validate_value(&value, &self.definition().validate, &self.document).await;
        let related = self.validate_related(&value).await;

        if errors.is_empty() && related.is_none() {
            return Ok(());
        }
        Err(FieldError {
            name: self.name().to_string(),
            errors,
            related,
        })
    }

    async fn validate_related(&self, value: &Value) -> Option<RelatedErrors> {
        match value {
            Value::Document(nested) => nested.validate_tree().await.map(RelatedErrors::Document),
            Value::Array(items) => {
                let mut results = Vec::with_capacity(items.len());
                for item in items {
                    let result = match item {
                        Value::Null => None,
                        Value::Document(nested) => {
                            nested.validate_tree().await.map(ItemError::Document)
                        }
                        other => {
                            let issues = validate_value(
                                other,
                                &self.definition().validate,
                                &self.document,
                            )
                            .await;
                            (!issues.is_empty()).then_some(ItemError::Issues(issues))
                        }
                    };
                    results.push(result);
                }
                results
                    .iter()
                    .any(Option::is_some)
                    .then_some(RelatedErrors::Items(results))
            }
            _ => None,
        }
    }

    fn prepare(&self, value: Value) -> Value {
        let definition = self.definition();
        let value = cast(value, &definition.field_type, &self.document);
        match &definition.set {
            Some(set) => set(&self.document, value),
            None => value,
        }
    }

    /// Replace the stored value.
    ///
    /// The owning document is invalidated first. Documents that are this document or one
    /// of its ancestors are replaced by `null`; the remaining nested documents are taken
    /// out of their previous parent's slots and adopted.
    fn store(&self, value: Value) {
        self.document.invalidate();
        let value = self.without_ancestors(value);

        let current = value.documents();
        for nested in &current {
            if let Some(previous_parent) = nested.parent() {
                previous_parent.detach(nested);
            }
            self.document.adopt(nested);
        }
        let previous = self
            .document
            .with_slot_mut(self.index, |slot| std::mem::replace(&mut slot.value, value));
        for old in previous.documents() {
            if !current.iter().any(|doc| doc.ptr_eq(&old)) {
                self.document.release(&old);
            }
        }
    }

    fn without_ancestors(&self, value: Value) -> Value {
        match value {
            Value::Document(doc) if self.document.lineage_contains(&doc) => {
                tracing::warn!(field = %self.name(), "refusing to nest a document inside itself");
                Value::Null
            }
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.without_ancestors(item))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, item)| (key, self.without_ancestors(item)))
                    .collect(),
            ),
            other => other,
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name())
            .field("value", &self.raw_value())
            .field("errors", &self.errors())
            .finish()
    }
}
