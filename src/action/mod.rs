//! Named actions invoked during a step to compute derived values.
//!
//! An action is a stateless `(config, context) -> value` computation. The
//! registry is filled once at startup (built-ins, then custom actions from
//! disk) and is read-only while tests run, so it can be shared between
//! concurrently executing tests behind an `Arc`.

mod builtin;
mod command;
mod mac;

pub use builtin::{EncodeAction, HashAction, TimestampAction, UuidAction};
pub use command::{CommandAction, CommandActionDefinition, action_name_from_path, load_custom_actions};
pub use mac::MacAction;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::path::{self, render};
use crate::transport::{HttpRequest, HttpResponse};
use crate::{Error, Result};

/// Read-only view of the step an action runs in.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    /// Identifier of the running test
    pub test_id: String,
    /// Zero-based index of the running step
    pub step: usize,
    /// Every visible variable
    pub variables: Map<String, Value>,
    /// The step's request, resolved with the variables bound so far
    pub request: Option<HttpRequest>,
    /// The response (only for actions that run after the request)
    pub response: Option<HttpResponse>,
}

impl ActionContext {
    /// JSON view of the context, as handed to external actions
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "testId": self.test_id,
            "step": self.step,
            "variables": self.variables,
            "request": self.request,
            "response": self.response,
        })
    }

    /// Look up a dotted facet such as `request.body` or `response.headers.etag`.
    #[must_use]
    pub fn facet(&self, source: &str) -> Option<Value> {
        let source = source.trim();
        if let Some(rest) = source.strip_prefix("response.") {
            return self.response.as_ref()?.facet(rest);
        }
        if let Some(name) = source.strip_prefix("variables.") {
            return path::lookup(&Value::Object(self.variables.clone()), name);
        }
        path::lookup(&self.to_value(), source)
    }
}

/// Capability interface implemented by every action.
#[async_trait]
pub trait Action: Send + Sync {
    /// Compute the action's value.
    async fn invoke(&self, config: &Value, context: &ActionContext) -> Result<Value>;
}

/// Where an action implementation came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSource {
    /// Seeded at startup
    Builtin,
    /// Loaded from a definition file
    File(PathBuf),
}

impl fmt::Display for ActionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => f.write_str("built-in"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

struct RegisteredAction {
    source: ActionSource,
    action: Arc<dyn Action>,
}

/// Name -> action map.
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, RegisteredAction>,
}

impl ActionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with the built-in actions.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, Arc<dyn Action>); 5] = [
            ("mac", Arc::new(MacAction)),
            ("hash", Arc::new(HashAction)),
            ("encode", Arc::new(EncodeAction)),
            ("timestamp", Arc::new(TimestampAction)),
            ("uuid", Arc::new(UuidAction)),
        ];
        for (name, action) in builtins {
            registry.actions.insert(
                name.to_string(),
                RegisteredAction {
                    source: ActionSource::Builtin,
                    action,
                },
            );
        }
        registry
    }

    /// Register an action.
    ///
    /// Re-registering a name from the same source replaces it; a different
    /// source fails with [`Error::Conflict`].
    pub fn register(
        &mut self,
        name: impl Into<String>,
        source: ActionSource,
        action: Arc<dyn Action>,
    ) -> Result<()> {
        let name = name.into();
        if let Some(existing) = self.actions.get(&name) {
            if existing.source != source {
                return Err(Error::Conflict {
                    name,
                    existing: existing.source.to_string(),
                    incoming: source.to_string(),
                });
            }
        }
        debug!(action = %name, source = %source, "Registered action");
        self.actions.insert(name, RegisteredAction { source, action });
        Ok(())
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Source of a registered action.
    #[must_use]
    pub fn source(&self, name: &str) -> Option<&ActionSource> {
        self.actions.get(name).map(|a| &a.source)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Invoke an action by name.
    ///
    /// Fails with [`Error::UnknownAction`] for unregistered names and wraps
    /// implementation failures in [`Error::Action`].
    pub async fn invoke(&self, name: &str, config: &Value, context: &ActionContext) -> Result<Value> {
        let registered = self
            .actions
            .get(name)
            .ok_or_else(|| Error::UnknownAction(name.to_string()))?;

        registered
            .action
            .invoke(config, context)
            .await
            .map_err(|e| Error::action(name, e))
    }
}

// ============================================================================
// Config helpers shared by the built-in actions
// ============================================================================

/// Optional string field of an action config.
pub(crate) fn config_str<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

/// Required string field of an action config.
pub(crate) fn require_str<'a>(config: &'a Value, key: &str) -> Result<&'a str> {
    config_str(config, key)
        .ok_or_else(|| Error::InvalidInput(format!("missing string field '{key}'")))
}

/// The data an action operates on: `data` literally, or the context facet
/// named by `source`.
pub(crate) fn input_data(config: &Value, context: &ActionContext) -> Result<String> {
    if let Some(data) = config.get("data") {
        return Ok(render(data));
    }
    if let Some(source) = config_str(config, "source") {
        return context
            .facet(source)
            .map(|v| render(&v))
            .ok_or_else(|| Error::InvalidInput(format!("source '{source}' is not available")));
    }
    Err(Error::InvalidInput("either 'data' or 'source' is required".to_string()))
}

/// Output encoding for binary results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Encoding {
    Hex,
    Base64,
    Base64Url,
}

impl Encoding {
    pub(crate) fn from_config(config: &Value) -> Result<Self> {
        match config_str(config, "encoding").map(str::to_ascii_lowercase).as_deref() {
            None | Some("hex") => Ok(Self::Hex),
            Some("base64") => Ok(Self::Base64),
            Some("base64url") => Ok(Self::Base64Url),
            Some(other) => Err(Error::unsupported("encoding", other)),
        }
    }

    pub(crate) fn encode(self, bytes: &[u8]) -> String {
        use base64::Engine;
        match self {
            Self::Hex => hex::encode(bytes),
            Self::Base64 => base64::engine::general_purpose::STANDARD.encode(bytes),
            Self::Base64Url => base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(Value);

    #[async_trait]
    impl Action for Constant {
        async fn invoke(&self, _config: &Value, _context: &ActionContext) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl Action for Failing {
        async fn invoke(&self, _config: &Value, _context: &ActionContext) -> Result<Value> {
            Err(Error::InvalidInput("nope".to_string()))
        }
    }

    #[test]
    fn builtins_are_seeded() {
        let registry = ActionRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["encode", "hash", "mac", "timestamp", "uuid"]);
        assert_eq!(registry.source("mac"), Some(&ActionSource::Builtin));
    }

    #[test]
    fn conflicting_source_is_rejected() {
        let mut registry = ActionRegistry::with_builtins();
        let err = registry
            .register("mac", ActionSource::File("mac.action.json".into()), Arc::new(Constant(json!(1))))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { ref name, .. } if name == "mac"));
    }

    #[test]
    fn same_source_is_idempotent() {
        let mut registry = ActionRegistry::new();
        let source = ActionSource::File("sign.action.json".into());
        registry
            .register("sign", source.clone(), Arc::new(Constant(json!(1))))
            .expect("first registration");
        registry
            .register("sign", source, Arc::new(Constant(json!(2))))
            .expect("same source re-registers");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn invoke_unknown_action() {
        let registry = ActionRegistry::new();
        let err = registry
            .invoke("missing", &Value::Null, &ActionContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAction(ref n) if n == "missing"));
    }

    #[tokio::test]
    async fn invoke_wraps_failures() {
        let mut registry = ActionRegistry::new();
        registry
            .register("bad", ActionSource::Builtin, Arc::new(Failing))
            .expect("registers");
        let err = registry
            .invoke("bad", &Value::Null, &ActionContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Action { ref name, .. } if name == "bad"));
    }

    #[tokio::test]
    async fn invoke_returns_value() {
        let mut registry = ActionRegistry::new();
        registry
            .register("one", ActionSource::Builtin, Arc::new(Constant(json!("v"))))
            .expect("registers");
        let value = registry
            .invoke("one", &Value::Null, &ActionContext::default())
            .await
            .expect("invokes");
        assert_eq!(value, json!("v"));
    }

    #[test]
    fn context_facets() {
        let mut request = HttpRequest::new("POST", "http://x/y");
        request.body = Some(json!({"a": 1}));
        let context = ActionContext {
            test_id: "t".into(),
            step: 2,
            variables: json!({"k": {"n": 5}}).as_object().cloned().unwrap_or_default(),
            request: Some(request),
            response: Some(HttpResponse::from_parts(200, Vec::new(), "ok".into(), 1)),
        };
        assert_eq!(context.facet("request.body"), Some(json!({"a": 1})));
        assert_eq!(context.facet("request.url"), Some(json!("http://x/y")));
        assert_eq!(context.facet("response.status"), Some(json!(200)));
        assert_eq!(context.facet("response.text"), Some(json!("ok")));
        assert_eq!(context.facet("variables.k.n"), Some(json!(5)));
        assert_eq!(context.facet("testId"), Some(json!("t")));
        assert_eq!(context.facet("response.body.nope"), None);
    }

    #[test]
    fn input_data_sources() {
        let context = ActionContext::default();
        assert_eq!(input_data(&json!({"data": "abc"}), &context).expect("data"), "abc");
        assert_eq!(input_data(&json!({"data": 12}), &context).expect("data"), "12");
        assert!(input_data(&json!({"source": "request.body"}), &context).is_err());
        assert!(input_data(&json!({}), &context).is_err());
    }

    #[test]
    fn encodings() {
        assert_eq!(Encoding::Hex.encode(&[0xde, 0xad]), "dead");
        assert_eq!(Encoding::Base64.encode(b"hi?"), "aGk/");
        assert_eq!(Encoding::Base64Url.encode(b"hi?"), "aGk_");
        assert!(Encoding::from_config(&json!({"encoding": "rot13"})).is_err());
        assert_eq!(Encoding::from_config(&json!({})).expect("default"), Encoding::Hex);
    }
}
