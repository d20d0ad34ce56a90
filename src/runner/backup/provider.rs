//! Handlers that supply the documents a [`Backup`](crate::engine::Backup)
//! writes to disk.

use crate::api::GqlClient;
use crate::engine::{EngineError, ResourceHandler, ResourceType};
use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// A document that was already fetched, e.g. a node of a listing page.
pub struct Document(pub Value);

#[async_trait]
impl ResourceHandler<Value> for Document {
    async fn handle(&self, _ctx: &CancellationToken, _input: Option<&Value>) -> Result<Value, EngineError> {
        Ok(self.0.clone())
    }
}

/// Dependent resources that are fetched per parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Related {
    ProductVariants,
    ProductMedia,
    ProductMetafields,
    CustomerMetafields,
}

impl Related {
    pub fn kind(&self) -> ResourceType {
        match self {
            Related::ProductVariants => ResourceType::ProductVariant,
            Related::ProductMedia => ResourceType::ProductMedia,
            Related::ProductMetafields => ResourceType::ProductMetaField,
            Related::CustomerMetafields => ResourceType::CustomerMetaField,
        }
    }
}

/// Fetches a dependent resource of the parent document it receives.
pub struct Fetch {
    client: GqlClient,
    related: Related,
}

impl Fetch {
    pub fn new(client: GqlClient, related: Related) -> Self {
        Self { client, related }
    }
}

#[async_trait]
impl ResourceHandler<Value> for Fetch {
    async fn handle(&self, ctx: &CancellationToken, input: Option<&Value>) -> Result<Value, EngineError> {
        let owner = input
            .and_then(|parent| parent.get("id"))
            .and_then(Value::as_str)
            .ok_or(EngineError::MissingInput(self.related.kind()))?;

        let document = match self.related {
            Related::ProductVariants => self.client.product_variants(ctx, owner).await?,
            Related::ProductMedia => self.client.product_media(ctx, owner).await?,
            Related::ProductMetafields => self.client.product_metafields(ctx, owner).await?,
            Related::CustomerMetafields => self.client.customer_metafields(ctx, owner).await?,
        };
        Ok(document)
    }
}
