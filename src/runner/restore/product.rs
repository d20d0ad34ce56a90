use super::handler::{MediaHandler, MetafieldsHandler, OptionsHandler, ProductHandler, RestoreOptions, VariantsHandler};
use super::scan;
use crate::api::GqlClient;
use crate::engine::{Engine, Resource, ResourceCollection, ResourceType, Restore};
use crate::runner::{drive, Runner, RunnerError, Stats};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Restores the products of a backup folder, each followed by its
/// options, metafields, variants and media.
pub struct ProductRunner {
    engine: Arc<Engine<Restore>>,
    client: GqlClient,
    root: PathBuf,
    options: Arc<RestoreOptions>,
    stats: Stats,
}

impl ProductRunner {
    /// `root` is the backup folder, the one holding `products/`.
    pub fn new(engine: Arc<Engine<Restore>>, client: GqlClient, root: impl Into<PathBuf>, options: Arc<RestoreOptions>) -> Self {
        Self {
            engine,
            client,
            root: root.into(),
            options,
            stats: Stats::new(),
        }
    }
}

async fn queue_products(
    engine: Arc<Engine<Restore>>,
    client: GqlClient,
    root: PathBuf,
    options: Arc<RestoreOptions>,
) -> Result<usize, RunnerError> {
    let root_dir = ResourceType::Product.root_dir();
    let groups = scan(root.join(root_dir)).await?;
    let mut queued = 0;

    for (id, mut files) in groups {
        let Some(file) = files.remove(ResourceType::Product.file()) else {
            warn!(%id, "No product document, skipping");
            continue;
        };
        let path = Path::new(root_dir).join(&id);

        let mut job = ResourceCollection::new(Resource::new(
            ResourceType::Product,
            path.clone(),
            ProductHandler::new(client.clone(), file.clone(), Arc::clone(&options)),
        ))
        .with_child(Resource::new(
            ResourceType::ProductOption,
            path.clone(),
            OptionsHandler::new(client.clone(), file, Arc::clone(&options)),
        ));
        if let Some(file) = files.remove(ResourceType::ProductMetaField.file()) {
            let handler = MetafieldsHandler::for_product(client.clone(), file, Arc::clone(&options));
            job = job.with_child(Resource::new(ResourceType::ProductMetaField, path.clone(), handler));
        }
        if let Some(file) = files.remove(ResourceType::ProductVariant.file()) {
            let handler = VariantsHandler::new(client.clone(), file, Arc::clone(&options));
            job = job.with_child(Resource::new(ResourceType::ProductVariant, path.clone(), handler));
        }
        if let Some(file) = files.remove(ResourceType::ProductMedia.file()) {
            let handler = MediaHandler::new(client.clone(), file, Arc::clone(&options));
            job = job.with_child(Resource::new(ResourceType::ProductMedia, path.clone(), handler));
        }

        engine.add(ResourceType::Product, job).await?;
        queued += 1;
    }
    Ok(queued)
}

#[async_trait]
impl Runner for ProductRunner {
    fn kind(&self) -> ResourceType {
        ResourceType::Product
    }

    async fn run(&mut self) -> Result<(), RunnerError> {
        let client = self.client.clone();
        let root = self.root.clone();
        let options = Arc::clone(&self.options);
        self.stats = drive(
            &self.engine,
            ResourceType::Product,
            &ResourceType::product_types(),
            "restore",
            move |engine| queue_products(engine, client, root, options),
        )
        .await?;
        Ok(())
    }

    fn stats(&self) -> &Stats {
        &self.stats
    }
}
