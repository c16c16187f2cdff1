//! Built-in validators
//!
//! Apart from [`presence`] and [`absence`], every validator accepts `Null`: a missing
//! value is a presence concern, not a format one.

use async_trait::async_trait;
use jsonschema::JSONSchema;
use regex::Regex;
use std::future::Future;

use super::Validator;
use crate::document::Document;
use crate::error::{ModelError, Result};
use crate::value::Value;

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// Fails on `null`, blank strings and empty arrays
pub struct Presence;

#[async_trait(?Send)]
impl Validator for Presence {
    fn name(&self) -> &str {
        "presence"
    }

    fn message(&self) -> String {
        "is required".to_string()
    }

    async fn check(&self, value: &Value, _document: &Document) -> bool {
        is_present(value)
    }
}

pub fn presence() -> Presence {
    Presence
}

/// Inverse of [`Presence`]
pub struct Absence;

#[async_trait(?Send)]
impl Validator for Absence {
    fn name(&self) -> &str {
        "absence"
    }

    fn message(&self) -> String {
        "must be blank".to_string()
    }

    async fn check(&self, value: &Value, _document: &Document) -> bool {
        !is_present(value)
    }
}

pub fn absence() -> Absence {
    Absence
}

/// Character count of a string or element count of an array
pub struct Length {
    min: Option<usize>,
    max: Option<usize>,
}

#[async_trait(?Send)]
impl Validator for Length {
    fn name(&self) -> &str {
        "length"
    }

    fn message(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("must be between {} and {} long", min, max),
            (Some(min), None) => format!("must be at least {} long", min),
            (None, Some(max)) => format!("must be at most {} long", max),
            (None, None) => "has an invalid length".to_string(),
        }
    }

    async fn check(&self, value: &Value, _document: &Document) -> bool {
        let len = match value {
            Value::String(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            _ => return true,
        };
        self.min.map_or(true, |min| len >= min) && self.max.map_or(true, |max| len <= max)
    }
}

pub fn length(min: Option<usize>, max: Option<usize>) -> Length {
    Length { min, max }
}

/// Inclusive numeric bounds
pub struct Range {
    min: Option<f64>,
    max: Option<f64>,
}

#[async_trait(?Send)]
impl Validator for Range {
    fn name(&self) -> &str {
        "range"
    }

    fn message(&self) -> String {
        "is out of range".to_string()
    }

    async fn check(&self, value: &Value, _document: &Document) -> bool {
        let Some(n) = value.as_f64() else {
            return true;
        };
        self.min.map_or(true, |min| n >= min) && self.max.map_or(true, |max| n <= max)
    }
}

pub fn range(min: Option<f64>, max: Option<f64>) -> Range {
    Range { min, max }
}

/// String must match a regular expression
pub struct Pattern {
    regex: Regex,
}

#[async_trait(?Send)]
impl Validator for Pattern {
    fn name(&self) -> &str {
        "pattern"
    }

    fn message(&self) -> String {
        "has an invalid format".to_string()
    }

    async fn check(&self, value: &Value, _document: &Document) -> bool {
        match value {
            Value::String(s) => self.regex.is_match(s),
            _ => true,
        }
    }
}

pub fn pattern(regex: Regex) -> Pattern {
    Pattern { regex }
}

/// Value must equal one of a fixed set
pub struct Inclusion {
    values: Vec<Value>,
}

#[async_trait(?Send)]
impl Validator for Inclusion {
    fn name(&self) -> &str {
        "inclusion"
    }

    fn message(&self) -> String {
        "is not included in the list".to_string()
    }

    async fn check(&self, value: &Value, _document: &Document) -> bool {
        value.is_null() || self.values.iter().any(|v| v.deep_eq(value))
    }
}

pub fn inclusion(values: impl IntoIterator<Item = impl Into<Value>>) -> Inclusion {
    Inclusion {
        values: values.into_iter().map(Into::into).collect(),
    }
}

/// Value must not equal any of a fixed set
pub struct Exclusion {
    values: Vec<Value>,
}

#[async_trait(?Send)]
impl Validator for Exclusion {
    fn name(&self) -> &str {
        "exclusion"
    }

    fn message(&self) -> String {
        "is reserved".to_string()
    }

    async fn check(&self, value: &Value, _document: &Document) -> bool {
        value.is_null() || !self.values.iter().any(|v| v.deep_eq(value))
    }
}

pub fn exclusion(values: impl IntoIterator<Item = impl Into<Value>>) -> Exclusion {
    Exclusion {
        values: values.into_iter().map(Into::into).collect(),
    }
}

/// Value, as plain data, must satisfy a JSON Schema
pub struct JsonSchema {
    compiled: JSONSchema,
}

#[async_trait(?Send)]
impl Validator for JsonSchema {
    fn name(&self) -> &str {
        "json_schema"
    }

    fn message(&self) -> String {
        "does not match the expected shape".to_string()
    }

    async fn check(&self, value: &Value, _document: &Document) -> bool {
        value.is_null() || self.compiled.is_valid(&value.to_json())
    }
}

pub fn json_schema(schema: &serde_json::Value) -> Result<JsonSchema> {
    let compiled = JSONSchema::compile(schema)
        .map_err(|e| ModelError::InvalidJsonSchema(e.to_string()))?;
    Ok(JsonSchema { compiled })
}

/// Synchronous closure validator
pub struct FnValidator<F> {
    name: String,
    check: F,
}

#[async_trait(?Send)]
impl<F> Validator for FnValidator<F>
where
    F: Fn(&Value) -> bool,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, value: &Value, _document: &Document) -> bool {
        (self.check)(value)
    }
}

pub fn from_fn<F>(name: impl Into<String>, check: F) -> FnValidator<F>
where
    F: Fn(&Value) -> bool,
{
    FnValidator {
        name: name.into(),
        check,
    }
}

/// Asynchronous closure validator; receives owned handles so the future can outlive the call.
pub struct AsyncFnValidator<F> {
    name: String,
    check: F,
}

#[async_trait(?Send)]
impl<F, Fut> Validator for AsyncFnValidator<F>
where
    F: Fn(Value, Document) -> Fut,
    Fut: Future<Output = bool>,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, value: &Value, document: &Document) -> bool {
        (self.check)(value.clone(), document.clone()).await
    }
}

pub fn from_async<F, Fut>(name: impl Into<String>, check: F) -> AsyncFnValidator<F>
where
    F: Fn(Value, Document) -> Fut,
    Fut: Future<Output = bool>,
{
    AsyncFnValidator {
        name: name.into(),
        check,
    }
}
