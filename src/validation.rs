//! Response validation.
//!
//! Every declared check runs, in declaration order, and produces exactly
//! one [`ValidationResult`]. Missing facets, malformed paths, bad regexes
//! and unresolved expected values fail the check they belong to and never
//! abort the step.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::render;
use crate::transport::HttpResponse;
use crate::variables::VariableStore;

/// Comparison rule applied by a check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckKind {
    /// Canonical string equality
    #[default]
    Equals,
    /// Canonical string inequality (an absent facet passes)
    NotEquals,
    /// Facet is present
    Exists,
    /// Facet is absent
    Absent,
    /// Facet text matches a regular expression
    Matches,
    /// Substring of the facet text, or element of the facet array
    Contains,
    /// Numeric `actual < expected`
    LessThan,
    /// Numeric `actual > expected`
    GreaterThan,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Equals => "equals",
            Self::NotEquals => "notEquals",
            Self::Exists => "exists",
            Self::Absent => "absent",
            Self::Matches => "matches",
            Self::Contains => "contains",
            Self::LessThan => "lessThan",
            Self::GreaterThan => "greaterThan",
        };
        f.write_str(name)
    }
}

/// A declared check against a step's response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    /// Response facet (`status`, `headers.x`, `body.a.b`, `text`, `durationMs`)
    pub target: String,

    /// Comparison rule
    #[serde(default)]
    pub kind: CheckKind,

    /// Expected value; placeholders are resolved before comparison
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,

    /// Optional human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Validation {
    /// Create a check
    pub fn new(target: impl Into<String>, kind: CheckKind, expected: Option<Value>) -> Self {
        Self {
            target: target.into(),
            kind,
            expected,
            description: None,
        }
    }

    fn label(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.target, self.kind))
    }
}

/// Origin of a validation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultKind {
    /// A declared check
    Check,
    /// The HTTP call failed
    Transport,
    /// An action could not be invoked or failed
    Action,
    /// A placeholder in the request or an action config was unresolved
    UnresolvedVariable,
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Where the result came from
    pub kind: ResultKind,
    /// What was checked
    pub description: String,
    /// Whether the check passed
    pub valid: bool,
    /// Actual value observed (absent facets are `None`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    /// Expected value after substitution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    /// Failure detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationResult {
    /// Synthetic failing result describing a runtime error
    pub fn failure(kind: ResultKind, description: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            valid: false,
            actual: None,
            expected: None,
            message: Some(message.into()),
        }
    }
}

/// Run every check against the response, preserving declaration order.
#[must_use]
pub fn validate(
    checks: &[Validation],
    response: &HttpResponse,
    variables: &VariableStore,
) -> Vec<ValidationResult> {
    checks
        .iter()
        .map(|check| validate_one(check, response, variables))
        .collect()
}

fn validate_one(
    check: &Validation,
    response: &HttpResponse,
    variables: &VariableStore,
) -> ValidationResult {
    let actual = response.facet(&check.target);
    let resolved = check.expected.as_ref().map(|e| variables.resolve(e));

    let mut result = ValidationResult {
        kind: ResultKind::Check,
        description: check.label(),
        valid: false,
        actual: actual.clone(),
        expected: resolved.as_ref().map(|r| r.value.clone()),
        message: None,
    };

    if let Some(unresolved) = resolved.as_ref().filter(|r| !r.is_complete()) {
        result.message = Some(format!(
            "Expected value references unresolved variable(s): {}",
            unresolved.unresolved.join(", ")
        ));
        return result;
    }

    let outcome = compare(check.kind, actual.as_ref(), result.expected.as_ref());
    match outcome {
        Ok(()) => result.valid = true,
        Err(message) => result.message = Some(message),
    }
    result
}

fn compare(kind: CheckKind, actual: Option<&Value>, expected: Option<&Value>) -> Result<(), String> {
    match kind {
        CheckKind::Exists => actual.map(|_| ()).ok_or_else(|| "Facet is absent".to_string()),
        CheckKind::Absent => match actual {
            None => Ok(()),
            Some(v) => Err(format!("Facet is present with value {}", render(v))),
        },
        CheckKind::NotEquals => {
            let expected = require_expected(kind, expected)?;
            match actual {
                Some(a) if render(a) == render(expected) => {
                    Err(format!("Expected value other than '{}'", render(expected)))
                }
                _ => Ok(()),
            }
        }
        CheckKind::Equals => {
            let expected = require_expected(kind, expected)?;
            let actual = require_actual(actual)?;
            if render(actual) == render(expected) {
                Ok(())
            } else {
                Err(format!("Expected '{}' but got '{}'", render(expected), render(actual)))
            }
        }
        CheckKind::Matches => {
            let pattern = render(require_expected(kind, expected)?);
            let actual = require_actual(actual)?;
            let re = Regex::new(&pattern).map_err(|e| format!("Invalid pattern '{pattern}': {e}"))?;
            if re.is_match(&render(actual)) {
                Ok(())
            } else {
                Err(format!("'{}' does not match /{pattern}/", render(actual)))
            }
        }
        CheckKind::Contains => {
            let expected = require_expected(kind, expected)?;
            let actual = require_actual(actual)?;
            let found = match actual {
                Value::Array(items) => items.iter().any(|item| render(item) == render(expected)),
                other => render(other).contains(&render(expected)),
            };
            if found {
                Ok(())
            } else {
                Err(format!("'{}' does not contain '{}'", render(actual), render(expected)))
            }
        }
        CheckKind::LessThan | CheckKind::GreaterThan => {
            let expected = require_expected(kind, expected)?;
            let actual = require_actual(actual)?;
            let (a, e) = (as_number(actual)?, as_number(expected)?);
            let ok = if kind == CheckKind::LessThan { a < e } else { a > e };
            if ok {
                Ok(())
            } else {
                let op = if kind == CheckKind::LessThan { "<" } else { ">" };
                Err(format!("Expected {a} {op} {e}"))
            }
        }
    }
}

fn require_actual(actual: Option<&Value>) -> Result<&Value, String> {
    actual.ok_or_else(|| "Facet is absent".to_string())
}

fn require_expected(kind: CheckKind, expected: Option<&Value>) -> Result<&Value, String> {
    expected.ok_or_else(|| format!("Check '{kind}' requires an expected value"))
}

fn as_number(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| format!("'{}' is not a number", render(value)))
}
