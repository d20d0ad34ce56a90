//! # Throttled Transport
//!
//! [`RoundTrip`] is the seam every HTTP call goes through. [`ThrottledTransport`]
//! decorates another round tripper with the shared [`Throttler`]:
//!
//! ```text
//! no cost header  -> pass through
//! cost header     -> wait for credits -> send -> read Date
//!                 -> (newest response so far) reconcile -> return
//! ```

use super::error::ApiError;
use super::throttle::Throttler;
use super::types::Extensions;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, DATE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Header declaring the credit cost of a request.
pub const HEADER_QUERY_COST: &str = "X-Shopify-GQL-Request-Cost";

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// A `200 OK` response carrying `body` as JSON.
    pub fn json(body: &serde_json::Value) -> Self {
        Self::new(StatusCode::OK, body.to_string())
    }

    pub fn with_header(mut self, name: reqwest::header::HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Server processing time from the `Date` header, or now if it is
    /// missing or malformed.
    pub fn processed_at(&self) -> DateTime<Utc> {
        self.headers
            .get(DATE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
            .map(|date| date.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    }
}

/// Sends a request and reads the whole response.
#[async_trait]
pub trait RoundTrip: Send + Sync {
    async fn round_trip(&self, ctx: &CancellationToken, request: reqwest::Request) -> Result<RawResponse, ApiError>;
}

#[async_trait]
impl RoundTrip for reqwest::Client {
    async fn round_trip(&self, _ctx: &CancellationToken, request: reqwest::Request) -> Result<RawResponse, ApiError> {
        let response = self.execute(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(RawResponse { status, headers, body })
    }
}

#[async_trait]
impl<R: RoundTrip + ?Sized> RoundTrip for Arc<R> {
    async fn round_trip(&self, ctx: &CancellationToken, request: reqwest::Request) -> Result<RawResponse, ApiError> {
        self.as_ref().round_trip(ctx, request).await
    }
}

#[derive(Deserialize)]
struct Envelope {
    extensions: Option<Extensions>,
}

/// Rate-limited decorator around another [`RoundTrip`].
pub struct ThrottledTransport<R = reqwest::Client> {
    inner: R,
    throttler: Arc<Throttler>,
    latest_response_at: Mutex<Option<DateTime<Utc>>>,
}

impl<R: RoundTrip> ThrottledTransport<R> {
    pub fn new(inner: R, throttler: Arc<Throttler>) -> Self {
        Self {
            inner,
            throttler,
            latest_response_at: Mutex::new(None),
        }
    }

    pub fn throttler(&self) -> &Arc<Throttler> {
        &self.throttler
    }

    /// Reconciles the throttler with the status carried by `body`, but only if
    /// the response was processed after every response applied so far.
    ///
    /// Returns whether the throttler was updated.
    pub fn observe(&self, processed_at: DateTime<Utc>, body: &[u8]) -> bool {
        let mut latest = self
            .latest_response_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if latest.is_some_and(|seen| seen >= processed_at) {
            trace!(%processed_at, "Stale response, not reconciling");
            return false;
        }
        *latest = Some(processed_at);

        let status = serde_json::from_slice::<Envelope>(body)
            .ok()
            .and_then(|envelope| envelope.extensions)
            .and_then(|extensions| extensions.cost)
            .map(|cost| cost.throttle_status);
        match status {
            Some(status) => {
                self.throttler.reconcile(&status);
                true
            }
            None => {
                debug!(%processed_at, "Response carried no throttle status");
                false
            }
        }
    }
}

fn parse_cost(value: &HeaderValue) -> Result<u32, ApiError> {
    value
        .to_str()
        .ok()
        .and_then(|cost| cost.trim().parse().ok())
        .ok_or_else(|| ApiError::InvalidCost(String::from_utf8_lossy(value.as_bytes()).into_owned()))
}

#[async_trait]
impl<R: RoundTrip> RoundTrip for ThrottledTransport<R> {
    async fn round_trip(&self, ctx: &CancellationToken, request: reqwest::Request) -> Result<RawResponse, ApiError> {
        let cost = match request.headers().get(HEADER_QUERY_COST) {
            Some(value) => parse_cost(value)?,
            None => return self.inner.round_trip(ctx, request).await,
        };

        self.throttler.wait(ctx, cost).await?;
        let response = self.inner.round_trip(ctx, request).await?;
        self.observe(response.processed_at(), &response.body);

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::ScriptedTransport;
    use serde_json::json;

    fn throttle_body(currently_available: f64) -> serde_json::Value {
        json!({
            "data": {},
            "extensions": {"cost": {
                "requestedQueryCost": 10,
                "actualQueryCost": 8,
                "throttleStatus": {
                    "maximumAvailable": 2000.0,
                    "currentlyAvailable": currently_available,
                    "restoreRate": 100.0
                }
            }}
        })
    }

    fn request(cost: Option<&str>) -> reqwest::Request {
        let mut builder = reqwest::Client::new()
            .post("https://teststore.example.com/admin/api/2025-01/graphql.json")
            .body(r#"{"query":"{ shop { name } }"}"#);
        if let Some(cost) = cost {
            builder = builder.header(HEADER_QUERY_COST, cost);
        }
        builder.build().unwrap()
    }

    fn at(date: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc2822(date).unwrap().with_timezone(&Utc)
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_without_cost_pass_through() {
        let inner = ScriptedTransport::new().on("shop", throttle_body(5.0));
        let transport = ThrottledTransport::new(inner, Arc::new(Throttler::default()));

        let response = transport.round_trip(&CancellationToken::new(), request(None)).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(transport.throttler().tokens(), 2000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cost_is_reserved_then_reconciled() {
        let inner = ScriptedTransport::new().on("shop", throttle_body(1500.0));
        let transport = ThrottledTransport::new(inner, Arc::new(Throttler::default()));

        transport.round_trip(&CancellationToken::new(), request(Some("10"))).await.unwrap();

        assert_eq!(transport.throttler().tokens(), 1500.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_cost_header_is_rejected() {
        let transport = ThrottledTransport::new(ScriptedTransport::new(), Arc::new(Throttler::default()));
        let err = transport
            .round_trip(&CancellationToken::new(), request(Some("ten")))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidCost(cost) if cost == "ten"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_does_not_roll_bucket_back() {
        let older = at("Tue, 15 Nov 1994 08:12:31 GMT");
        let newer = at("Tue, 15 Nov 1994 08:12:32 GMT");
        let body_old = throttle_body(100.0).to_string();
        let body_new = throttle_body(700.0).to_string();

        let reordered = ThrottledTransport::new(ScriptedTransport::new(), Arc::new(Throttler::default()));
        assert!(reordered.observe(newer, body_new.as_bytes()));
        assert!(!reordered.observe(older, body_old.as_bytes()));

        let in_order = ThrottledTransport::new(ScriptedTransport::new(), Arc::new(Throttler::default()));
        assert!(in_order.observe(newer, body_new.as_bytes()));

        assert_eq!(reordered.throttler().tokens(), in_order.throttler().tokens());
        assert_eq!(reordered.throttler().tokens(), 700.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_date_header_orders_reconciliation() {
        let inner = ScriptedTransport::new()
            .on_response(
                "shop",
                RawResponse::json(&throttle_body(900.0)).with_header(DATE, "Tue, 15 Nov 1994 08:12:32 GMT"),
            )
            .on_response(
                "shop",
                RawResponse::json(&throttle_body(50.0)).with_header(DATE, "Tue, 15 Nov 1994 08:12:31 GMT"),
            );
        let transport = ThrottledTransport::new(inner, Arc::new(Throttler::default()));
        let ctx = CancellationToken::new();

        transport.round_trip(&ctx, request(Some("10"))).await.unwrap();
        transport.round_trip(&ctx, request(Some("10"))).await.unwrap();

        // The second response is older, so only its reservation is applied.
        assert_eq!(transport.throttler().tokens(), 890.0);
    }

    #[test]
    fn test_missing_date_falls_back_to_now() {
        let before = Utc::now();
        let response = RawResponse::json(&json!({})).with_header(DATE, "not a date");
        assert!(response.processed_at() >= before);
    }
}
