//! reqwest-backed transport

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{
    Client, Method,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{HttpRequest, HttpResponse, HttpTransport};
use crate::{Error, Result};

/// HTTP transport over a shared [`reqwest::Client`]
pub struct ReqwestTransport {
    client: Client,
    default_timeout: Duration,
}

impl ReqwestTransport {
    /// Create a new transport
    ///
    /// `default_timeout` applies to requests that do not carry their own.
    pub fn new(default_timeout: Duration, user_agent: &str, insecure: bool) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            default_timeout,
        })
    }

    fn build_headers(request: &HttpRequest) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name = name
                .parse::<HeaderName>()
                .map_err(|e| Error::Transport(format!("Invalid header name '{name}': {e}")))?;
            let header_value = value
                .parse::<HeaderValue>()
                .map_err(|e| Error::Transport(format!("Invalid value for header '{name}': {e}")))?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let url = Url::parse(&request.url)
            .map_err(|e| Error::Transport(format!("Invalid URL '{}': {e}", request.url)))?;
        let method = request
            .method
            .to_ascii_uppercase()
            .parse::<Method>()
            .map_err(|e| Error::Transport(format!("Invalid HTTP method '{}': {e}", request.method)))?;
        let timeout = request.timeout_or(self.default_timeout);

        let mut builder = self
            .client
            .request(method, url)
            .headers(Self::build_headers(request)?)
            .timeout(timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        match &request.body {
            None | Some(Value::Null) => {}
            Some(Value::String(raw)) => builder = builder.body(raw.clone()),
            Some(json) => builder = builder.json(json),
        }

        let start = Instant::now();
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Transport(format!(
                    "Request to {} timed out after {}ms",
                    request.url,
                    timeout.as_millis()
                ))
            } else {
                Error::Transport(format!("Request to {} failed: {e}", request.url))
            }
        })?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response body: {e}")))?;
        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(method = %request.method, url = %request.url, status, duration_ms, "Response received");

        Ok(HttpResponse::from_parts(status, headers, text, duration_ms))
    }
}
