//! Document Tree Tests
//!
//! Population, serialization, dirty tracking and structural traversal over nested
//! and recursive schemas.

use familiar_documents::{
    path, Document, FieldDefinition, FieldType, PathTarget, Schema, Value,
};
use serde_json::json;

fn book_schema() -> Schema {
    Schema::builder()
        .field("title", FieldDefinition::new(FieldType::string()))
        .field("year", FieldDefinition::new(FieldType::integer()))
        .build()
}

fn user_schema() -> Schema {
    let book = book_schema();
    Schema::builder()
        .field("name", FieldDefinition::new(FieldType::string()))
        .field("age", FieldDefinition::new(FieldType::integer()))
        .field("book", FieldDefinition::new(FieldType::schema(&book)))
        .field(
            "books",
            FieldDefinition::new(FieldType::array_of(FieldType::schema(&book))),
        )
        .field(
            "tags",
            FieldDefinition::new(FieldType::array_of(FieldType::string())),
        )
        .build()
}

fn fixture() -> serde_json::Value {
    serde_json::from_str(include_str!("fixtures/user.json")).unwrap()
}

fn nested(value: Option<Value>) -> Document {
    match value {
        Some(Value::Document(doc)) => doc,
        other => panic!("Expected nested document, got {:?}", other),
    }
}

// =============================================================================
// Population
// =============================================================================

#[test]
fn test_populate_coerces_the_whole_tree() {
    let doc = Document::new(fixture(), &user_schema());

    assert_eq!(
        doc.serialize(),
        json!({
            "name": "Ada",
            "age": 36,
            "book": {"title": "1843", "year": 1843},
            "books": [null, {"title": "100", "year": null}, {"title": "Notes", "year": 1842}],
            "tags": ["math", "7", null]
        })
    );
}

#[test]
fn test_strict_schema_drops_unknown_keys() {
    let doc = Document::new(fixture(), &user_schema());
    assert!(doc.get("nickname").is_none());
    assert!(doc.serialize().get("nickname").is_none());
}

#[test]
fn test_loose_schema_keeps_unknown_keys_out_of_traversal() {
    let schema = Schema::builder()
        .strict(false)
        .field("name", FieldDefinition::new(FieldType::string()))
        .build();
    let doc = Document::new(json!({"name": "Ada", "nickname": "countess"}), &schema);

    assert_eq!(doc.get("nickname"), Some(Value::from("countess")));
    assert_eq!(doc.serialize(), json!({"name": "Ada"}));
    assert_eq!(doc.flatten().count(), 1);
    assert!(doc.get_path(&path!["nickname"]).is_none());
    assert!(!doc.has_path(&path!["nickname"]));

    doc.set("mood", "curious").unwrap();
    let copy = doc.deep_clone();
    assert_eq!(copy.get("mood"), Some(Value::from("curious")));
}

#[test]
fn test_nested_document_scenario() {
    let doc = Document::new(json!({"book": {"title": 100}}), &user_schema());
    let book = nested(doc.get("book"));

    assert_eq!(book.get("title"), Some(Value::from("100")));
    assert!(book.parent().unwrap().ptr_eq(&doc));
}

#[test]
fn test_array_of_documents_preserves_null_slots() {
    let doc = Document::new(json!({"books": [null, {"title": 100}]}), &user_schema());
    let books = doc.get("books").unwrap();
    let items = books.as_array().unwrap();

    assert_eq!(items.len(), 2);
    assert!(items[0].is_null());
    let second = items[1].as_document().unwrap();
    assert_eq!(second.get("title"), Some(Value::from("100")));
    assert!(second.parent().unwrap().ptr_eq(&doc));
}

#[test]
fn test_empty_array_is_distinct_from_null() {
    let doc = Document::new(json!({"books": []}), &user_schema());
    assert_eq!(doc.serialize()["books"], json!([]));
    doc.set("books", Value::Null).unwrap();
    assert_eq!(doc.serialize()["books"], json!(null));
}

#[test]
fn test_serialize_populate_roundtrip() {
    let original = Document::new(fixture(), &user_schema());
    let restored = Document::new(json!({}), &user_schema());
    restored.reset();
    restored.populate(original.serialize());

    assert!(restored.equals(&original));
    assert!(original.equals(original.serialize()));
}

#[test]
fn test_populate_from_another_document() {
    let original = Document::new(fixture(), &user_schema());
    let copy = Document::new(Value::Null, &user_schema());
    copy.populate(&original);
    assert!(copy.equals(&original));
}

// =============================================================================
// Dirty Tracking
// =============================================================================

#[test]
fn test_construction_data_counts_as_change() {
    let doc = Document::new(fixture(), &user_schema());
    assert!(doc.is_changed());
    doc.commit();
    assert!(!doc.is_changed());
}

#[test]
fn test_nested_change_marks_every_ancestor() {
    let doc = Document::new(fixture(), &user_schema());
    doc.commit();

    let book = nested(doc.get("books").and_then(|b| b.as_array().map(|items| items[2].clone())));
    book.set("title", "Sketch").unwrap();

    assert!(book.field("title").unwrap().is_changed());
    assert!(book.is_changed());
    assert!(doc.field("books").unwrap().is_changed());
    assert!(doc.is_changed());
    assert!(!doc.field("name").unwrap().is_changed());
}

#[test]
fn test_rollback_restores_last_commit() {
    let doc = Document::new(fixture(), &user_schema());
    doc.commit();
    let committed = doc.serialize();

    nested(doc.get("book")).set("title", "Changed").unwrap();
    doc.set("name", "Grace").unwrap();
    doc.set("books", Value::Null).unwrap();
    doc.rollback();

    assert_eq!(doc.serialize(), committed);
    assert!(!doc.is_changed());
    assert!(nested(doc.get("book")).parent().unwrap().ptr_eq(&doc));
}

#[test]
fn test_rollback_without_commit_restores_defaults() {
    let schema = Schema::builder()
        .field("name", FieldDefinition::new(FieldType::string()).default_value("anon"))
        .build();
    let doc = Document::new(json!({"name": "Ada"}), &schema);
    doc.rollback();
    assert_eq!(doc.get("name"), Some(Value::from("anon")));
}

// =============================================================================
// Structural Operations
// =============================================================================

#[test]
fn test_deep_clone_is_independent() {
    let doc = Document::new(fixture(), &user_schema());
    let copy = doc.deep_clone();

    assert!(copy.equals(&doc));
    assert!(!copy.ptr_eq(&doc));
    assert!(copy.parent().is_none());

    let copied_book = nested(copy.get("book"));
    assert!(copied_book.parent().unwrap().ptr_eq(&copy));
    copied_book.set("title", "Other").unwrap();

    assert_eq!(nested(doc.get("book")).get("title"), Some(Value::from("1843")));
    assert!(!copy.equals(&doc));
}

#[test]
fn test_reset_and_clear() {
    let book = book_schema();
    let schema = Schema::builder()
        .field("name", FieldDefinition::new(FieldType::string()).default_value("anon"))
        .field(
            "book",
            FieldDefinition::new(FieldType::schema(&book)).default_value(json!({"title": "Draft"})),
        )
        .build();
    let doc = Document::new(json!({"name": "Ada", "book": {"title": "Notes"}}), &schema);

    doc.clear();
    assert_eq!(doc.serialize(), json!({"name": null, "book": null}));

    doc.reset();
    assert_eq!(
        doc.serialize(),
        json!({"name": "anon", "book": {"title": "Draft", "year": null}})
    );
    assert!(nested(doc.get("book")).parent().unwrap().ptr_eq(&doc));
}

#[test]
fn test_fake_uses_generators() {
    let schema = Schema::builder()
        .field(
            "name",
            FieldDefinition::new(FieldType::string()).fake_with(|_| Value::from("Fake Name")),
        )
        .field("age", FieldDefinition::new(FieldType::integer()).fake_value("42"))
        .field("note", FieldDefinition::new(FieldType::string()))
        .build();
    let doc = Document::new(json!({"note": "x"}), &schema);
    doc.fake();
    assert_eq!(doc.serialize(), json!({"name": "Fake Name", "age": 42, "note": null}));
}

#[test]
fn test_flatten_order_and_paths() {
    let doc = Document::new(fixture(), &user_schema());
    let paths: Vec<_> = doc.flatten().map(|flat| flat.path).collect();

    assert_eq!(
        paths,
        vec![
            path!["name"],
            path!["age"],
            path!["book"],
            path!["book", "title"],
            path!["book", "year"],
            path!["books"],
            path!["books", 1, "title"],
            path!["books", 1, "year"],
            path!["books", 2, "title"],
            path!["books", 2, "year"],
            path!["tags"],
        ]
    );
}

#[test]
fn test_flatten_lists_null_nested_field_once() {
    let doc = Document::new(json!({"books": []}), &user_schema());
    let names: Vec<String> = doc
        .flatten()
        .map(|flat| familiar_documents::display_path(&flat.path))
        .collect();
    assert_eq!(names, vec!["name", "age", "book", "books", "tags"]);
}

#[test]
fn test_paths_are_declared_even_when_null() {
    let doc = Document::new(json!({}), &user_schema());

    assert!(doc.has_path(&path!["book", "title"]));
    assert!(doc.has_path(&path!["books", 4, "year"]));
    assert!(doc.get_path(&path!["book", "title"]).is_none());
    assert!(!doc.has_path(&path!["book", "isbn"]));

    let value = doc.get_path(&path!["book"]).and_then(PathTarget::into_value);
    assert_eq!(value, Some(Value::Null));
}

#[test]
fn test_get_path_walks_documents_and_arrays() {
    let doc = Document::new(fixture(), &user_schema());

    let title = doc.get_path(&path!["books", 2, "title"]).and_then(PathTarget::into_value);
    assert_eq!(title, Some(Value::from("Notes")));

    let tag = doc.get_path(&path!["tags", 1]).and_then(PathTarget::into_value);
    assert_eq!(tag, Some(Value::from("7")));

    let field = doc
        .get_path(&path!["book", "$year"])
        .and_then(PathTarget::into_field)
        .unwrap();
    assert_eq!(field.name(), "year");
    assert!(field.document().parent().unwrap().ptr_eq(&doc));

    assert!(doc.get_path(&path!["books", 9, "title"]).is_none());
}

#[test]
fn test_is_nested() {
    assert!(Document::new(json!({}), &user_schema()).is_nested());
    assert!(!Document::new(json!({}), &book_schema()).is_nested());
}

// =============================================================================
// Recursive Schemas
// =============================================================================

fn category_schema() -> Schema {
    Schema::builder()
        .field("name", FieldDefinition::new(FieldType::string()))
        .fields_with(|this| {
            vec![(
                "children".to_string(),
                FieldDefinition::new(FieldType::array_of(FieldType::recursive(this))),
            )]
        })
        .build()
}

#[test]
fn test_self_recursive_population() {
    let data = json!({
        "name": "root",
        "children": [
            {"name": "a", "children": [{"name": "a1", "children": null}]},
            null
        ]
    });
    let doc = Document::new(data.clone(), &category_schema());

    assert_eq!(doc.serialize(), data);
    let leaf = doc
        .get_path(&path!["children", 0, "children", 0, "$name"])
        .and_then(PathTarget::into_field)
        .unwrap();
    assert_eq!(leaf.value(), Value::from("a1"));
    assert!(leaf.document().root().ptr_eq(&doc));
    assert_eq!(doc.flatten().count(), 6);
}

/// `author.books[*].author` points back at the author schema
fn author_schema() -> Schema {
    Schema::builder()
        .field("name", FieldDefinition::new(FieldType::string()))
        .fields_with(|author| {
            let book = Schema::builder()
                .field("title", FieldDefinition::new(FieldType::string()))
                .field("author", FieldDefinition::new(FieldType::recursive(author)))
                .build();
            vec![(
                "books".to_string(),
                FieldDefinition::new(FieldType::array_of(FieldType::schema(&book))),
            )]
        })
        .build()
}

#[test]
fn test_mutually_recursive_schemas() {
    let schema = author_schema();
    let data = json!({
        "name": "Ada",
        "books": [
            {"title": "Notes", "author": {"name": "Ada", "books": [{"title": 1843, "author": null}]}},
            null
        ]
    });
    let doc = Document::new(data, &schema);

    assert!(schema.has_path(&path!["books", 0, "author", "books", 3, "title"]));
    assert!(!schema.has_path(&path!["books", 0, "author", "title"]));

    let title = doc
        .get_path(&path!["books", 0, "author", "books", 0, "title"])
        .and_then(PathTarget::into_value);
    assert_eq!(title, Some(Value::from("1843")));

    let inner = doc
        .get_path(&path!["books", 0, "author", "books", 0, "$title"])
        .and_then(PathTarget::into_field)
        .unwrap();
    assert!(inner.document().root().ptr_eq(&doc));

    let copy = Document::new(doc.serialize(), &schema);
    assert!(copy.equals(&doc));
    assert_eq!(doc.flatten().count(), 8);
}

// =============================================================================
// Custom Types and Typed Wrappers
// =============================================================================

#[test]
fn test_custom_type_caster() {
    let schema = Schema::builder()
        .type_caster("slug", |value: Value| match value {
            Value::String(s) => Value::String(s.trim().to_lowercase().replace(' ', "-")),
            other => other,
        })
        .field("slug", FieldDefinition::new(FieldType::named("slug")))
        .build();
    let doc = Document::new(json!({"slug": " Hello World "}), &schema);
    assert_eq!(doc.get("slug"), Some(Value::from("hello-world")));
}

/// Typed view over a user document
struct User(Document);

impl User {
    fn new(data: serde_json::Value) -> Self {
        Self(Document::new(data, &user_schema()))
    }

    fn name(&self) -> Option<String> {
        self.0.get("name")?.as_str().map(str::to_string)
    }

    fn age(&self) -> Option<i64> {
        self.0.get("age")?.as_i64()
    }
}

#[test]
fn test_typed_wrapper_over_document() {
    let user = User::new(json!({"name": "Ada", "age": "36"}));
    assert_eq!(user.name().as_deref(), Some("Ada"));
    assert_eq!(user.age(), Some(36));
}
