//! Suite document model.
//!
//! ```text
//! Suite ─┬─ variables (suite defaults)
//!        └─ tests[] ─┬─ id, tags, skip, variables
//!                    └─ steps[] ─┬─ actions[]   (before / after the request)
//!                                ├─ request     (template)
//!                                ├─ validations[]
//!                                └─ capture     (var <- response facet)
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::transport::HttpRequest;
use crate::validation::Validation;
use crate::variables::{Resolved, VariableStore};

/// A combined, runnable suite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Suite {
    /// Tests in execution order
    pub tests: Vec<TestCase>,

    /// Suite-level default variables
    #[serde(default)]
    pub variables: Map<String, Value>,
}

/// A single test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique identifier within the suite
    pub id: String,

    /// Optional tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Skip without executing
    #[serde(default)]
    pub skip: bool,

    /// Test-scope default variables
    #[serde(default)]
    pub variables: Map<String, Value>,

    /// Ordered steps
    pub steps: Vec<Step>,
}

/// One request / response / validate unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Optional label used in reports
    #[serde(default)]
    pub name: Option<String>,

    /// Request template
    pub request: RequestTemplate,

    /// Actions to invoke before or after the request
    #[serde(default)]
    pub actions: Vec<ActionInvocation>,

    /// Checks against the response
    #[serde(default)]
    pub validations: Vec<Validation>,

    /// Variables to bind from response facets (`name -> facet path`)
    #[serde(default)]
    pub capture: BTreeMap<String, String>,
}

impl Step {
    /// Label for reports: the declared name or `step <n>` (1-based)
    #[must_use]
    pub fn label(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("step {}", index + 1))
    }

    /// Actions declared for the given phase, in declaration order
    pub fn actions_for(&self, phase: ActionPhase) -> impl Iterator<Item = &ActionInvocation> {
        self.actions.iter().filter(move |a| a.when == phase)
    }
}

fn default_method() -> String {
    "GET".to_string()
}

/// Request template; every field may contain placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTemplate {
    /// HTTP method
    #[serde(default = "default_method")]
    pub method: String,

    /// Target URL
    pub url: String,

    /// Headers
    #[serde(default)]
    pub headers: BTreeMap<String, Value>,

    /// Query parameters
    #[serde(default)]
    pub query: BTreeMap<String, Value>,

    /// Body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Per-request timeout override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl RequestTemplate {
    /// Resolve the template against the current variables.
    ///
    /// Unresolved placeholders are left as visible markers and reported in
    /// [`Resolved::unresolved`].
    #[must_use]
    pub fn resolve(&self, variables: &VariableStore) -> Resolved<HttpRequest> {
        let mut unresolved = Vec::new();
        let mut text = |template: &str| {
            let resolved = variables.resolve_text(template);
            unresolved.extend(resolved.unresolved);
            resolved.value
        };

        let method = text(&self.method).to_ascii_uppercase();
        let url = text(&self.url);
        let mut render_map = |map: &BTreeMap<String, Value>| -> BTreeMap<String, String> {
            map.iter()
                .map(|(k, v)| {
                    let resolved = variables.resolve(v);
                    unresolved.extend(resolved.unresolved);
                    (k.clone(), crate::path::render(&resolved.value))
                })
                .collect()
        };
        let headers = render_map(&self.headers);
        let query = render_map(&self.query);

        let body = self.body.as_ref().map(|b| {
            let resolved = variables.resolve(b);
            unresolved.extend(resolved.unresolved);
            resolved.value
        });

        Resolved {
            value: HttpRequest {
                method,
                url,
                headers,
                query,
                body,
                timeout_ms: self.timeout_ms,
            },
            unresolved,
        }
    }
}

/// When an action runs relative to the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPhase {
    /// Before the request is resolved and sent
    #[default]
    Before,
    /// After the response is received, before validations
    After,
}

/// A named action plus its configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionInvocation {
    /// Registered action name
    pub action: String,

    /// Configuration object; placeholders are resolved before invocation
    #[serde(default)]
    pub config: Value,

    /// Variable receiving the result (defaults to the action name)
    #[serde(default)]
    pub output: Option<String>,

    /// Phase
    #[serde(default)]
    pub when: ActionPhase,
}

impl ActionInvocation {
    /// Variable name the result is bound to
    #[must_use]
    pub fn output_name(&self) -> &str {
        self.output.as_deref().unwrap_or(&self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn deserialize_minimal_test() {
        let test: TestCase = serde_json::from_value(json!({
            "id": "t1",
            "steps": [{"request": {"url": "http://x"}}]
        }))
        .expect("valid test");
        assert!(!test.skip);
        assert!(test.tags.is_empty());
        assert_eq!(test.steps[0].request.method, "GET");
        assert!(test.steps[0].validations.is_empty());
        assert_eq!(test.steps[0].label(0), "step 1");
    }

    #[test]
    fn deserialize_actions_with_phase() {
        let step: Step = serde_json::from_value(json!({
            "request": {"url": "http://x"},
            "actions": [
                {"action": "mac", "output": "sig", "config": {"macType": "hmac"}},
                {"action": "uuid", "when": "after"}
            ]
        }))
        .expect("valid step");
        let before: Vec<_> = step.actions_for(ActionPhase::Before).collect();
        let after: Vec<_> = step.actions_for(ActionPhase::After).collect();
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].output_name(), "sig");
        assert_eq!(after[0].output_name(), "uuid");
    }

    #[test]
    fn request_template_resolution() {
        let defaults = json!({"base": "http://api", "token": "t0k", "n": 3});
        let vars = VariableStore::new(Arc::new(defaults.as_object().cloned().unwrap_or_default()));
        let template: RequestTemplate = serde_json::from_value(json!({
            "method": "post",
            "url": "{{base}}/items",
            "headers": {"Authorization": "Bearer {{token}}", "X-N": "{{n}}"},
            "query": {"page": 2, "q": "{{missing}}"},
            "body": {"count": "{{n}}"},
            "timeoutMs": 500
        }))
        .expect("valid template");

        let resolved = template.resolve(&vars);
        let request = resolved.value;
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "http://api/items");
        assert_eq!(request.headers["Authorization"], "Bearer t0k");
        assert_eq!(request.headers["X-N"], "3");
        assert_eq!(request.query["page"], "2");
        assert_eq!(request.query["q"], "<unresolved:missing>");
        assert_eq!(request.body, Some(json!({"count": 3})));
        assert_eq!(request.timeout_ms, Some(500));
        assert_eq!(resolved.unresolved, vec!["missing"]);
    }
}
