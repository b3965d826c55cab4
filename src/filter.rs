//! Tag filtering.
//!
//! A requested tag matches a test when it equals the test id or one of the
//! test's declared tags. Order is preserved.

use crate::suite::TestCase;
use crate::{Error, Result};

/// Keep the tests matching any requested tag.
///
/// An empty `tags` list disables filtering, and a suite with zero tests
/// yields an empty selection. A non-empty request that matches none of the
/// suite's tests fails with [`Error::NoMatch`].
pub fn filter_by_tags(tests: Vec<TestCase>, tags: &[String]) -> Result<Vec<TestCase>> {
    if tags.is_empty() || tests.is_empty() {
        return Ok(tests);
    }

    let selected: Vec<TestCase> = tests
        .into_iter()
        .filter(|test| {
            tags.iter()
                .any(|tag| *tag == test.id || test.tags.iter().any(|t| t == tag))
        })
        .collect();

    if selected.is_empty() {
        return Err(Error::NoMatch(tags.join(", ")));
    }
    Ok(selected)
}

/// Split a comma-separated tag list, dropping blanks.
#[must_use]
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tests() -> Vec<TestCase> {
        serde_json::from_value(json!([
            {"id": "a", "steps": []},
            {"id": "b", "tags": ["smoke"], "steps": []},
            {"id": "c", "tags": ["smoke", "slow"], "steps": []}
        ]))
        .expect("valid tests")
    }

    fn ids(tests: &[TestCase]) -> Vec<&str> {
        tests.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn filters_by_identifier() {
        let selected = filter_by_tags(tests(), &["a".to_string()]).expect("matches");
        assert_eq!(ids(&selected), vec!["a"]);
    }

    #[test]
    fn filters_by_declared_tag_preserving_order() {
        let selected =
            filter_by_tags(tests(), &["slow".to_string(), "smoke".to_string()]).expect("matches");
        assert_eq!(ids(&selected), vec!["b", "c"]);
    }

    #[test]
    fn no_match_is_an_error() {
        let err = filter_by_tags(tests(), &["z".to_string()]).unwrap_err();
        assert!(matches!(err, Error::NoMatch(ref t) if t == "z"));
    }

    #[test]
    fn empty_request_keeps_everything() {
        assert_eq!(filter_by_tags(tests(), &[]).expect("no filter").len(), 3);
        assert!(filter_by_tags(Vec::new(), &[]).expect("no filter").is_empty());
    }

    #[test]
    fn empty_suite_is_not_a_tag_mistake() {
        let selected = filter_by_tags(Vec::new(), &["smoke".to_string()]).expect("empty suite");
        assert!(selected.is_empty());
    }

    #[test]
    fn parse_tag_list() {
        assert_eq!(parse_tags(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(parse_tags("").is_empty());
    }
}
