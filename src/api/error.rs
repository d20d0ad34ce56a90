//! Error types for the GraphQL client and its transports.

use super::throttle::ThrottleError;
use crate::engine::EngineError;
use thiserror::Error;

/// Errors that can occur while talking to the Admin API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be built or sent.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status code: {0}")]
    Status(u16),

    /// The response carried a top-level `errors` array.
    #[error("graphql error: {0}")]
    GraphQl(String),

    /// A mutation was rejected with `userErrors`.
    #[error("user errors: {0}")]
    UserErrors(String),

    #[error("response contained no data")]
    MissingData,

    #[error("invalid query cost header: {0}")]
    InvalidCost(String),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Throttle(#[from] ThrottleError),
}

impl From<ApiError> for EngineError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Throttle(ThrottleError::Cancelled) => EngineError::Cancelled,
            other => EngineError::handler(other),
        }
    }
}
