//! # GraphQL Client
//!
//! [`GqlClient`] builds Admin API requests, declares their credit cost in the
//! [`HEADER_QUERY_COST`] header and decodes the `data` / `errors` envelope.
//! It never sleeps itself: pacing is the job of the [`RoundTrip`] it is given,
//! normally a [`ThrottledTransport`](super::ThrottledTransport).

use super::error::ApiError;
use super::transport::{RoundTrip, HEADER_QUERY_COST};
use super::types::{GraphQlRequest, GraphQlResponse};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Admin API version every request is sent to.
pub const API_VERSION: &str = "2025-01";

/// Cost declared for single-resource queries and mutations.
pub(crate) const SINGLE_COST: u32 = 10;

/// Cost declared for a connection query fetching `first` nodes.
pub(crate) fn page_cost(first: u32) -> u32 {
    first + 2
}

#[derive(Clone)]
pub struct GqlClient {
    http: reqwest::Client,
    transport: Arc<dyn RoundTrip>,
    endpoint: String,
    token: String,
}

impl GqlClient {
    pub fn new(store: &str, token: impl Into<String>, transport: Arc<dyn RoundTrip>) -> Self {
        Self {
            http: reqwest::Client::new(),
            transport,
            endpoint: format!("https://{store}/admin/api/{API_VERSION}/graphql.json"),
            token: token.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends `query` and decodes its `data` into `T`.
    ///
    /// With a `cost`, the request is paced by the rate limiter; without one it
    /// goes straight out.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        ctx: &CancellationToken,
        query: &str,
        variables: Value,
        cost: Option<u32>,
    ) -> Result<T, ApiError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .header("X-Shopify-Access-Token", &self.token)
            .json(&GraphQlRequest { query, variables });
        if let Some(cost) = cost {
            request = request.header(HEADER_QUERY_COST, cost);
        }
        let request = request.build()?;

        trace!(endpoint = %self.endpoint, ?cost, "Sending query");
        let response = self.transport.round_trip(ctx, request).await?;
        if !response.status.is_success() {
            return Err(ApiError::Status(response.status.as_u16()));
        }

        let decoded: GraphQlResponse<T> = serde_json::from_slice(&response.body)?;
        if !decoded.errors.is_empty() {
            let messages: Vec<_> = decoded.errors.into_iter().map(|err| err.message).collect();
            return Err(ApiError::GraphQl(messages.join("; ")));
        }
        if let Some(cost) = decoded.extensions.as_ref().and_then(|ext| ext.cost.as_ref()) {
            debug!(
                requested = cost.requested_query_cost,
                actual = ?cost.actual_query_cost,
                available = cost.throttle_status.currently_available,
                "Query cost"
            );
        }
        decoded.data.ok_or(ApiError::MissingData)
    }
}

/// Returns the `userErrors` (or `mediaUserErrors`) of a mutation payload as an
/// error, if there are any.
pub(crate) fn check_user_errors(payload: &Value) -> Result<(), ApiError> {
    let errors: Vec<String> = ["userErrors", "mediaUserErrors"]
        .iter()
        .filter_map(|key| payload.get(*key).and_then(Value::as_array))
        .flatten()
        .map(|err| {
            let message = err.get("message").and_then(Value::as_str).unwrap_or("unknown error");
            match err.get("field") {
                Some(Value::Array(field)) if !field.is_empty() => {
                    let field: Vec<_> = field.iter().filter_map(Value::as_str).collect();
                    format!("{}: {message}", field.join("."))
                }
                _ => message.to_string(),
            }
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::UserErrors(errors.join("; ")))
    }
}

/// Takes the payload of mutation `name` out of `data` and checks its user errors.
pub(crate) fn mutation_payload(mut data: Value, name: &str) -> Result<Value, ApiError> {
    let payload = data.get_mut(name).map(Value::take).ok_or(ApiError::MissingData)?;
    check_user_errors(&payload)?;
    Ok(payload)
}
