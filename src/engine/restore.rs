//! Restore doer: hands each resource to its handler, which reads the stored
//! document and pushes it back to the API.

use super::core::Doer;
use super::error::EngineError;
use super::resource::Resource;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Identifier the remote API assigned to a restored resource.
///
/// A restored parent passes its ID down so children can attach to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteId(pub String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Restore {
    store: String,
    started_at: DateTime<Local>,
}

impl Restore {
    pub fn new(store: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            started_at: Local::now(),
        }
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }
}

#[async_trait]
impl Doer for Restore {
    type Payload = RemoteId;

    async fn execute(
        &self,
        ctx: &CancellationToken,
        resource: &Resource<RemoteId>,
        input: Option<&RemoteId>,
    ) -> Result<RemoteId, EngineError> {
        debug!(resource_type = %resource.kind, path = %resource.path.display(), parent = ?input, "Restoring");
        resource.handler.handle(ctx, input).await
    }
}
