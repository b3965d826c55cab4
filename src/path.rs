//! Dotted JSON paths shared by placeholders, response facets and captures.
//!
//! ```text
//! "auth.user"            -> [Key("auth"), Key("user")]
//! "items[0].name"        -> [Key("items"), Index(0), Key("name")]
//! "results[].id"         -> [Key("results"), Wildcard, Key("id")]
//! "results[*].id"        -> same as above
//! ```

use serde_json::Value;

/// A single segment in a parsed JSON path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key: `"foo"`.
    Key(String),
    /// Array wildcard: `"[]"` or `"[*]"`.
    Wildcard,
    /// Array index: `"[0]"`.
    Index(usize),
}

/// A parsed JSON path.
pub type JsonPath = Vec<PathSegment>;

/// Parse a dot-separated JSON path string into segments.
///
/// Malformed bracket expressions (`"a[x]"`, `"a[1"`) are kept as literal
/// keys so they simply fail to match instead of matching something else.
#[must_use]
pub fn parse(path: &str) -> JsonPath {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        let Some(open) = part.find('[') else {
            segments.push(PathSegment::Key(part.to_string()));
            continue;
        };

        let key = &part[..open];
        let mut brackets = Vec::new();
        let mut rest = &part[open..];
        let mut well_formed = true;
        while !rest.is_empty() {
            let Some(close) = rest.find(']') else {
                well_formed = false;
                break;
            };
            if !rest.starts_with('[') {
                well_formed = false;
                break;
            }
            let inner = &rest[1..close];
            if inner.is_empty() || inner == "*" {
                brackets.push(PathSegment::Wildcard);
            } else if let Ok(idx) = inner.parse::<usize>() {
                brackets.push(PathSegment::Index(idx));
            } else {
                well_formed = false;
                break;
            }
            rest = &rest[close + 1..];
        }

        if !well_formed {
            segments.push(PathSegment::Key(part.to_string()));
            continue;
        }
        if !key.is_empty() {
            segments.push(PathSegment::Key(key.to_string()));
        }
        segments.extend(brackets);
    }
    segments
}

/// Resolve a parsed path against a value, collecting all matched leaf values.
///
/// Array wildcards expand into every element of the matched array.
#[must_use]
pub fn resolve(value: &Value, path: &[PathSegment]) -> Vec<Value> {
    let Some((head, tail)) = path.split_first() else {
        return vec![value.clone()];
    };

    match head {
        PathSegment::Key(key) => value
            .get(key.as_str())
            .map(|child| resolve(child, tail))
            .unwrap_or_default(),
        PathSegment::Wildcard => value
            .as_array()
            .map(|arr| arr.iter().flat_map(|v| resolve(v, tail)).collect())
            .unwrap_or_default(),
        PathSegment::Index(idx) => value
            .as_array()
            .and_then(|arr| arr.get(*idx))
            .map(|child| resolve(child, tail))
            .unwrap_or_default(),
    }
}

/// Look up a path, returning `None` when nothing matches.
///
/// A single match is returned as-is; a wildcard producing several matches
/// is returned as an array. An explicit `null` in the document is `Some(Null)`.
#[must_use]
pub fn lookup(value: &Value, path: &str) -> Option<Value> {
    let parsed = parse(path);
    if parsed.iter().any(|s| *s == PathSegment::Wildcard) {
        let matches = resolve(value, &parsed);
        return (!matches.is_empty()).then_some(Value::Array(matches));
    }
    let mut results = resolve(value, &parsed);
    match results.len() {
        0 => None,
        _ => Some(results.swap_remove(0)),
    }
}

/// Render a JSON value as plain text: strings raw, everything else serialized.
#[must_use]
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_keys_and_indices() {
        assert_eq!(
            parse("items[0].name"),
            vec![
                PathSegment::Key("items".into()),
                PathSegment::Index(0),
                PathSegment::Key("name".into())
            ]
        );
        assert_eq!(
            parse("results[].id"),
            vec![
                PathSegment::Key("results".into()),
                PathSegment::Wildcard,
                PathSegment::Key("id".into())
            ]
        );
        assert_eq!(parse("[1][0]"), vec![PathSegment::Index(1), PathSegment::Index(0)]);
    }

    #[test]
    fn malformed_brackets_are_literal_keys() {
        assert_eq!(parse("a[x]"), vec![PathSegment::Key("a[x]".into())]);
        assert_eq!(parse("a[1"), vec![PathSegment::Key("a[1".into())]);
    }

    #[test]
    fn lookup_distinguishes_absent_from_null() {
        let doc = json!({"a": null, "b": {"c": [1, 2]}});
        assert_eq!(lookup(&doc, "a"), Some(Value::Null));
        assert_eq!(lookup(&doc, "missing"), None);
        assert_eq!(lookup(&doc, "b.c[1]"), Some(json!(2)));
        assert_eq!(lookup(&doc, "b.c[5]"), None);
    }

    #[test]
    fn lookup_wildcard_collects() {
        let doc = json!({"r": [{"id": 1}, {"id": 2}, {"x": 3}]});
        assert_eq!(lookup(&doc, "r[].id"), Some(json!([1, 2])));
        assert_eq!(lookup(&doc, "r[*].id"), Some(json!([1, 2])));
        assert_eq!(lookup(&doc, "r[].nope"), None);
    }

    #[test]
    fn render_plain_text() {
        assert_eq!(render(&json!("hi")), "hi");
        assert_eq!(render(&json!(200)), "200");
        assert_eq!(render(&json!(true)), "true");
        assert_eq!(render(&json!([1, "x"])), r#"[1,"x"]"#);
    }
}
