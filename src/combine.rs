//! Combining independently loaded suite documents into one suite.
//!
//! - `tests` are concatenated in document order; a duplicate id is an error.
//! - `variables` are deep-merged: later scalars override, objects merge key by key.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::debug;

use crate::suite::{Suite, TestCase};
use crate::{Error, Result};

/// Deep-merge `overlay` into `base`.
///
/// Objects are merged key by key; any other value in `overlay` replaces the
/// value at the same path in `base`.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            merge_maps(base_map, overlay_map);
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Deep-merge two JSON objects, `overlay` winning on conflicts.
pub fn merge_maps(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match base.get_mut(key) {
            Some(existing) => deep_merge(existing, value),
            None => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Combine suite documents.
///
/// Each document must be an object with a `tests` array. Fails with
/// [`Error::Combine`] on malformed documents or duplicate test ids.
pub fn combine(documents: &[Value]) -> Result<Suite> {
    let mut suite = Suite::default();
    let mut seen = HashSet::new();

    for (index, document) in documents.iter().enumerate() {
        let Some(object) = document.as_object() else {
            return Err(Error::Combine(format!("document #{} is not an object", index + 1)));
        };
        let Some(tests) = object.get("tests") else {
            return Err(Error::Combine(format!(
                "document #{} is missing the required 'tests' field",
                index + 1
            )));
        };
        let tests: Vec<TestCase> = serde_json::from_value(tests.clone()).map_err(|e| {
            Error::Combine(format!("document #{} has malformed tests: {e}", index + 1))
        })?;

        for test in tests {
            if !seen.insert(test.id.clone()) {
                return Err(Error::Combine(format!(
                    "duplicate test id '{}' in document #{}",
                    test.id,
                    index + 1
                )));
            }
            suite.tests.push(test);
        }

        match object.get("variables") {
            None | Some(Value::Null) => {}
            Some(Value::Object(vars)) => merge_maps(&mut suite.variables, vars),
            Some(_) => {
                return Err(Error::Combine(format!(
                    "document #{} has non-object 'variables'",
                    index + 1
                )));
            }
        }
    }

    debug!(
        documents = documents.len(),
        tests = suite.tests.len(),
        variables = suite.variables.len(),
        "Combined suite documents"
    );
    Ok(suite)
}
