//! Backup runners: page through the API and queue one job per top-level
//! resource. The listing node itself is the parent document; its dependent
//! resources are fetched by the children once the parent is on disk.

pub mod customer;
pub mod product;
pub mod provider;

pub use customer::CustomerRunner;
pub use product::ProductRunner;

use super::RunnerError;
use crate::api::{GqlClient, Page, CUSTOMERS_PER_PAGE, PRODUCTS_PER_PAGE};
use crate::engine::{extract_numeric_id, Backup, Engine, Resource, ResourceCollection, ResourceType};
use provider::{Document, Fetch, Related};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

async fn page(client: &GqlClient, ctx: &CancellationToken, kind: ResourceType, after: Option<&str>) -> Result<Page, RunnerError> {
    let page = match kind {
        ResourceType::Product => client.products_page(ctx, PRODUCTS_PER_PAGE, after).await?,
        ResourceType::Customer => client.customers_page(ctx, CUSTOMERS_PER_PAGE, after).await?,
        ResourceType::ProductOption
        | ResourceType::ProductVariant
        | ResourceType::ProductMedia
        | ResourceType::ProductMetaField
        | ResourceType::CustomerMetaField => return Err(RunnerError::NotListable(kind)),
    };
    Ok(page)
}

/// Queues every `kind` resource of the store, each with one child per
/// entry of `related`. Returns the number of queued jobs.
async fn queue_all(
    engine: Arc<Engine<Backup>>,
    client: GqlClient,
    kind: ResourceType,
    related: &'static [Related],
) -> Result<usize, RunnerError> {
    let ctx = engine.cancellation_token().clone();
    let mut after: Option<String> = None;
    let mut queued = 0;

    loop {
        let page = page(&client, &ctx, kind, after.as_deref()).await?;
        let next = page.next_cursor().map(str::to_string);
        debug!(resource_type = %kind, nodes = page.nodes.len(), has_next = next.is_some(), "Fetched page");

        for node in page.nodes {
            let Some(id) = node.get("id").and_then(Value::as_str) else {
                warn!(resource_type = %kind, "Skipping node without id");
                continue;
            };
            let path = Path::new(kind.root_dir()).join(extract_numeric_id(id));

            let job = related.iter().fold(
                ResourceCollection::new(Resource::new(kind, path.clone(), Document(node))),
                |job, related| job.with_child(Resource::new(related.kind(), path.clone(), Fetch::new(client.clone(), *related))),
            );
            engine.add(kind, job).await?;
            queued += 1;
        }

        match next {
            Some(cursor) => after = Some(cursor),
            None => break,
        }
    }
    Ok(queued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::ScriptedTransport;

    #[tokio::test]
    async fn test_dependent_types_have_no_listing() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = GqlClient::new("teststore.example.com", "shpat_test", transport.clone());

        let err = page(&client, &CancellationToken::new(), ResourceType::ProductVariant, None)
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::NotListable(ResourceType::ProductVariant)));
        assert!(transport.requests().is_empty());
    }
}
