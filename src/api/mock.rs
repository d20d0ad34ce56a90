//! # Scripted Transport
//!
//! A [`RoundTrip`] that answers from a script instead of the network, for
//! testing the client, the throttled transport and the backup runners.
//!
//! Each scripted response is keyed by a needle: the first unused response
//! whose needle occurs in the request body is returned. Responses registered
//! with [`ScriptedTransport::always`] are never used up. Every request is
//! recorded so tests can assert on headers and variables.
//!
//! ```ignore
//! let transport = ScriptedTransport::new()
//!     .on("products(", json!({"data": {"products": {"nodes": [], "pageInfo": {}}}}))
//!     .always("productCreate", json!({"data": {"productCreate": {"product": {"id": "gid://shopify/Product/1"}}}}));
//! ```

use super::error::ApiError;
use super::transport::{RawResponse, RoundTrip};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

struct Script {
    needle: String,
    response: RawResponse,
    repeat: bool,
    used: bool,
}

/// A request as seen by the [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub headers: HeaderMap,
    pub body: Value,
}

impl RecordedRequest {
    pub fn query(&self) -> &str {
        self.body.get("query").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn variables(&self) -> &Value {
        self.body.get("variables").unwrap_or(&Value::Null)
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<Vec<Script>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn scripts(&self) -> MutexGuard<'_, Vec<Script>> {
        self.scripts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(self, needle: &str, response: RawResponse, repeat: bool) -> Self {
        self.scripts().push(Script {
            needle: needle.to_string(),
            response,
            repeat,
            used: false,
        });
        self
    }

    /// Answers the next request containing `needle` with `body`, once.
    pub fn on(self, needle: &str, body: Value) -> Self {
        self.push(needle, RawResponse::json(&body), false)
    }

    /// Answers the next request containing `needle` with `response`, once.
    pub fn on_response(self, needle: &str, response: RawResponse) -> Self {
        self.push(needle, response, false)
    }

    /// Answers every request containing `needle` with `body`.
    pub fn always(self, needle: &str, body: Value) -> Self {
        self.push(needle, RawResponse::json(&body), true)
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
    }

    /// Recorded requests whose query contains `needle`.
    pub fn requests_for(&self, needle: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.query().contains(needle))
            .collect()
    }
}

#[async_trait]
impl RoundTrip for ScriptedTransport {
    async fn round_trip(&self, _ctx: &CancellationToken, request: reqwest::Request) -> Result<RawResponse, ApiError> {
        let raw = request.body().and_then(|body| body.as_bytes()).unwrap_or_default();
        let body: Value = serde_json::from_slice(raw).unwrap_or(Value::Null);
        let text = String::from_utf8_lossy(raw).into_owned();

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                headers: request.headers().clone(),
                body,
            });
        }

        let mut scripts = self.scripts();
        let script = scripts
            .iter_mut()
            .find(|script| (script.repeat || !script.used) && text.contains(&script.needle));
        match script {
            Some(script) => {
                script.used = true;
                Ok(script.response.clone())
            }
            None => Ok(RawResponse::new(reqwest::StatusCode::NOT_FOUND, "no scripted response")),
        }
    }
}
