//! HTTP transport boundary
//!
//! The engine never talks to the network directly: every step goes through
//! an [`HttpTransport`]. [`ReqwestTransport`] is the production
//! implementation; tests substitute their own.

mod http;

pub use self::http::ReqwestTransport;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;
use crate::path;

/// A fully resolved HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    /// HTTP method (upper case)
    pub method: String,
    /// Absolute URL
    pub url: String,
    /// Request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Query parameters appended to the URL
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    /// Body: strings are sent raw, anything else as JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Per-request timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl HttpRequest {
    /// Create a request with no headers, query or body
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            body: None,
            timeout_ms: None,
        }
    }

    /// Effective timeout, falling back to `default`
    #[must_use]
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout_ms.map_or(default, Duration::from_millis)
    }
}

/// A received HTTP response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers, names lower-cased
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON body, or the raw text as a string when not JSON
    #[serde(default)]
    pub body: Value,
    /// Raw body text
    #[serde(default)]
    pub text: String,
    /// Round-trip time
    #[serde(default)]
    pub duration_ms: u64,
}

impl HttpResponse {
    /// Build a response from raw parts, parsing the body as JSON when possible
    pub fn from_parts(
        status: u16,
        headers: impl IntoIterator<Item = (String, String)>,
        text: String,
        duration_ms: u64,
    ) -> Self {
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.clone()))
        };
        Self {
            status,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
            body,
            text,
            duration_ms,
        }
    }

    /// Extract a facet of the response.
    ///
    /// Supported facets: `status`, `headers.<name>` (case-insensitive),
    /// `body`, `body.<json-path>`, `text`, `durationMs`.
    /// Returns `None` when the facet does not exist.
    #[must_use]
    pub fn facet(&self, target: &str) -> Option<Value> {
        let target = target.trim();
        let (head, rest) = match target.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => match target.find('[') {
                Some(idx) => (&target[..idx], Some(&target[idx..])),
                None => (target, None),
            },
        };

        match (head, rest) {
            ("status", None) => Some(Value::from(self.status)),
            ("text", None) => Some(Value::String(self.text.clone())),
            ("durationMs", None) => Some(Value::from(self.duration_ms)),
            ("headers", None) => serde_json::to_value(&self.headers).ok(),
            ("headers", Some(name)) => self
                .headers
                .get(&name.to_ascii_lowercase())
                .map(|v| Value::String(v.clone())),
            ("body", None) => Some(self.body.clone()),
            ("body", Some(rest)) => path::lookup(&self.body, rest),
            _ => None,
        }
    }
}

/// Transport trait for issuing HTTP requests
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and wait for the response.
    ///
    /// Network failures and timeouts surface as [`crate::Error::Transport`];
    /// any received response (including 4xx/5xx) is `Ok`.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}
