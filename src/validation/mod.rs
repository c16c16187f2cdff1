//! Field validation
//!
//! Rules are evaluated in declaration order, one at a time. A rule whose condition
//! evaluates false is skipped entirely; every other failing rule yields one
//! [`ValidationIssue`]. No rule short-circuits the others.

pub mod validators;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

use crate::config::ValidationConfig;
use crate::document::Document;
use crate::value::Value;

/// Code attached to issues when a rule does not set one
pub const DEFAULT_ERROR_CODE: u16 = 422;

/// One failed rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub validator: String,
    pub message: String,
    pub code: u16,
}

/// A value check, possibly asynchronous (e.g. a uniqueness lookup)
#[async_trait(?Send)]
pub trait Validator {
    /// Name reported in [`ValidationIssue::validator`]
    fn name(&self) -> &str;

    /// Message used when the rule does not provide one
    fn message(&self) -> String {
        "is invalid".to_string()
    }

    /// Whether `value` passes. `document` owns the field being validated.
    async fn check(&self, value: &Value, document: &Document) -> bool;
}

/// Predicate deciding whether a rule applies
pub type Condition = Rc<dyn Fn(&Document, &Value) -> bool>;

/// A validator with its reporting options
#[derive(Clone)]
pub struct Rule {
    validator: Rc<dyn Validator>,
    code: u16,
    message: Option<String>,
    condition: Option<Condition>,
}

impl Rule {
    pub fn new(validator: impl Validator + 'static) -> Self {
        Self {
            validator: Rc::new(validator),
            code: DEFAULT_ERROR_CODE,
            message: None,
            condition: None,
        }
    }

    pub fn code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Only apply the rule when `condition` holds
    pub fn when(mut self, condition: impl Fn(&Document, &Value) -> bool + 'static) -> Self {
        self.condition = Some(Rc::new(condition));
        self
    }

    pub fn validator(&self) -> &dyn Validator {
        self.validator.as_ref()
    }

    fn issue(&self) -> ValidationIssue {
        ValidationIssue {
            validator: self.validator.name().to_string(),
            message: self
                .message
                .clone()
                .unwrap_or_else(|| self.validator.message()),
            code: self.code,
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("validator", &self.validator.name())
            .field("code", &self.code)
            .field("message", &self.message)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

/// Evaluate `rules` against `value`, returning one issue per failing rule.
pub async fn validate_value(
    value: &Value,
    rules: &[Rule],
    document: &Document,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for rule in rules {
        if let Some(condition) = &rule.condition {
            if !condition(document, value) {
                continue;
            }
        }
        if !rule.validator.check(value, document).await {
            issues.push(rule.issue());
        }
    }
    issues
}

/// Options for `Document::validate_with`
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOptions {
    /// Record errors on the fields but resolve normally
    pub quiet: bool,
}

impl ValidateOptions {
    pub fn quiet() -> Self {
        Self { quiet: true }
    }
}

impl From<&ValidationConfig> for ValidateOptions {
    fn from(config: &ValidationConfig) -> Self {
        Self {
            quiet: config.quiet,
        }
    }
}
