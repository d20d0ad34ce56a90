use super::handler::{CustomerHandler, MetafieldsHandler, RestoreOptions};
use super::scan;
use crate::api::GqlClient;
use crate::engine::{Engine, Resource, ResourceCollection, ResourceType, Restore};
use crate::runner::{drive, Runner, RunnerError, Stats};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Restores the customers of a backup folder with their metafields.
pub struct CustomerRunner {
    engine: Arc<Engine<Restore>>,
    client: GqlClient,
    root: PathBuf,
    options: Arc<RestoreOptions>,
    stats: Stats,
}

impl CustomerRunner {
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

async fn queue_customers(
    engine: Arc<Engine<Restore>>,
    client: GqlClient,
    root: PathBuf,
    options: Arc<RestoreOptions>,
) -> Result<usize, RunnerError> {
    let root_dir = ResourceType::Customer.root_dir();
    let mut queued = 0;

    for (id, mut files) in scan(root.join(root_dir)).await? {
        let Some(file) = files.remove(ResourceType::Customer.file()) else {
            warn!(%id, "No customer document, skipping");
            continue;
        };
        let path = Path::new(root_dir).join(&id);
        let mut job = ResourceCollection::new(Resource::new(
            ResourceType::Customer,
            path.clone(),
            CustomerHandler::new(client.clone(), file, Arc::clone(&options)),
        ));
        if let Some(file) = files.remove(ResourceType::CustomerMetaField.file()) {
            job = job.with_child(Resource::new(
                ResourceType::CustomerMetaField,
                path,
                MetafieldsHandler::for_customer(client.clone(), file, Arc::clone(&options)),
            ));
        }

        engine.add(ResourceType::Customer, job).await?;
        queued += 1;
    }
    Ok(queued)
}

#[async_trait]
impl Runner for CustomerRunner {
    fn kind(&self) -> ResourceType {
        ResourceType::Customer
    }

    async fn run(&mut self) -> Result<(), RunnerError> {
        let client = self.client.clone();
        let root = self.root.clone();
        let options = Arc::clone(&self.options);
        self.stats = drive(
            &self.engine,
            ResourceType::Customer,
            &ResourceType::customer_types(),
            "restore",
            move |engine| queue_customers(engine, client, root, options),
        )
        .await?;
        Ok(())
    }

    fn stats(&self) -> &Stats {
        &self.stats
    }
}
