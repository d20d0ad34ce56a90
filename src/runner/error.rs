use crate::api::ApiError;
use crate::engine::{EngineError, ResourceType};
use thiserror::Error;

/// Errors that end a runner's production of jobs.
///
/// Failures of individual resources never show up here; they are counted
/// in the runner's [`Stats`](super::Stats).
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("producer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{0} has no listing of its own")]
    NotListable(ResourceType),

    #[error("invalid restore filter {0:?}, expected field=value")]
    InvalidFilter(String),
}
