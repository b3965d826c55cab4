//! Variable store and `{{placeholder}}` resolution.
//!
//! Lookups walk three layers, most specific first:
//!
//! ```text
//! bound     values bound while the test runs (action outputs, captures)
//! test      the test's own `variables` block
//! defaults  suite variables merged over the config document (shared, read-only)
//! ```
//!
//! Resolution is a single recursive pass over a JSON value. Values that are
//! substituted in are never re-scanned or escaped, and unresolvable
//! placeholders are replaced by a visible [`unresolved_marker`]. Resolving an
//! already resolved template is a no-op unless a substituted value itself
//! contains `{{...}}` text.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::path;

/// Opening placeholder delimiter.
const OPEN: &str = "{{";
/// Closing placeholder delimiter.
const CLOSE: &str = "}}";

/// Shared, immutable suite-level defaults.
pub type Defaults = Arc<Map<String, Value>>;

/// Text left in place of a placeholder that could not be resolved.
#[must_use]
pub fn unresolved_marker(name: &str) -> String {
    format!("<unresolved:{name}>")
}

/// Outcome of a resolution pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    /// The substituted value
    pub value: T,
    /// Placeholder names that could not be resolved, in encounter order
    pub unresolved: Vec<String>,
}

impl<T> Resolved<T> {
    /// Whether every placeholder was resolved
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Map the value, keeping the unresolved list
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            value: f(self.value),
            unresolved: self.unresolved,
        }
    }
}

/// One piece of a scanned template string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Split a string into literals and placeholder references.
///
/// An unterminated `{{` or an empty `{{ }}` is kept as literal text.
fn scan(input: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = input;

    while let Some(open) = rest.find(OPEN) {
        let after_open = &rest[open + OPEN.len()..];
        let Some(close) = after_open.find(CLOSE) else {
            break;
        };
        let name = after_open[..close].trim();
        if name.is_empty() {
            segments.push(Segment::Literal(&rest[..open + OPEN.len() + close + CLOSE.len()]));
        } else {
            if open > 0 {
                segments.push(Segment::Literal(&rest[..open]));
            }
            segments.push(Segment::Placeholder(name));
        }
        rest = &after_open[close + CLOSE.len()..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    segments
}

/// Per-test variable store.
///
/// Each test owns one store; only `defaults` is shared between tests.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    defaults: Defaults,
    test: Map<String, Value>,
    bound: Map<String, Value>,
}

impl VariableStore {
    /// Create a store over the suite defaults.
    #[must_use]
    pub fn new(defaults: Defaults) -> Self {
        Self {
            defaults,
            test: Map::new(),
            bound: Map::new(),
        }
    }

    /// Add the test's own variable block as a layer above the defaults.
    #[must_use]
    pub fn with_test_variables(mut self, variables: &Map<String, Value>) -> Self {
        self.test.clone_from(variables);
        self
    }

    /// Bind a value in the test scope. Later bindings of the same name win.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bound.insert(name.into(), value);
    }

    /// Get a variable by exact name, most specific layer first.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bound
            .get(name)
            .or_else(|| self.test.get(name))
            .or_else(|| self.defaults.get(name))
    }

    /// Look up a placeholder reference.
    ///
    /// `name` is tried verbatim first; otherwise the reference is split into
    /// a variable name and a JSON path (`auth.user`, `items[0].id`).
    #[must_use]
    pub fn lookup(&self, reference: &str) -> Option<Value> {
        if let Some(value) = self.get(reference) {
            return Some(value.clone());
        }
        let split = reference.find(['.', '['])?;
        let (name, rest) = reference.split_at(split);
        let rest = rest.strip_prefix('.').unwrap_or(rest);
        let root = self.get(name)?;
        path::lookup(root, rest)
    }

    /// Flattened view of every visible variable.
    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut merged = (*self.defaults).clone();
        for (k, v) in self.test.iter().chain(self.bound.iter()) {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Resolve every placeholder in a value (strings, objects, arrays).
    #[must_use]
    pub fn resolve(&self, template: &Value) -> Resolved<Value> {
        let mut unresolved = Vec::new();
        let value = self.resolve_value(template, &mut unresolved);
        Resolved { value, unresolved }
    }

    /// Resolve a string template.
    ///
    /// A string consisting of exactly one placeholder yields the bound value
    /// with its JSON type intact; otherwise the result is a string.
    #[must_use]
    pub fn resolve_str(&self, template: &str) -> Resolved<Value> {
        let mut unresolved = Vec::new();
        let value = self.resolve_string(template, &mut unresolved);
        Resolved { value, unresolved }
    }

    /// Resolve a string template and render the result as text.
    #[must_use]
    pub fn resolve_text(&self, template: &str) -> Resolved<String> {
        self.resolve_str(template).map(|v| path::render(&v))
    }

    fn resolve_value(&self, value: &Value, unresolved: &mut Vec<String>) -> Value {
        match value {
            Value::String(s) => self.resolve_string(s, unresolved),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.resolve_value(v, unresolved))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_value(v, unresolved)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn resolve_string(&self, template: &str, unresolved: &mut Vec<String>) -> Value {
        let segments = scan(template);

        if let [Segment::Placeholder(name)] = segments.as_slice() {
            return match self.lookup(name) {
                Some(value) => value,
                None => {
                    unresolved.push((*name).to_string());
                    Value::String(unresolved_marker(name))
                }
            };
        }

        if !segments.iter().any(|s| matches!(s, Segment::Placeholder(_))) {
            return Value::String(template.to_string());
        }

        let mut out = String::with_capacity(template.len());
        for segment in segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => match self.lookup(name) {
                    Some(value) => out.push_str(&path::render(&value)),
                    None => {
                        unresolved.push(name.to_string());
                        out.push_str(&unresolved_marker(name));
                    }
                },
            }
        }
        Value::String(out)
    }
}
