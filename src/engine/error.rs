//! # Engine Errors
//!
//! Every failure that can end up in a [`ResourceResult`](super::ResourceResult)
//! or be returned by the engine's own operations.

use super::resource::ResourceType;

/// Errors raised by the engine, its doers, and resource handlers.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("resource type {0} is not registered")]
    NotRegistered(ResourceType),
    #[error("workers for {0} are already running")]
    AlreadyRunning(ResourceType),
    #[error("no more jobs accepted for {0}")]
    Closed(ResourceType),
    #[error("operation cancelled")]
    Cancelled,
    /// Returned by a parent handler that wants its children skipped
    /// without counting as a failure.
    #[error("children skipped")]
    SkipChildren,
    /// A child handler ran without the output of its parent.
    #[error("{0} requires the output of its parent")]
    MissingInput(ResourceType),
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("handler error: {0}")]
    Handler(Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    /// Wraps any error raised inside a resource handler.
    pub fn handler(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        EngineError::Handler(Box::new(err))
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, EngineError::SkipChildren)
    }
}
