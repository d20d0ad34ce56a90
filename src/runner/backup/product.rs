use super::provider::Related;
use super::queue_all;
use crate::api::GqlClient;
use crate::engine::{Backup, Engine, ResourceType};
use crate::runner::{drive, Runner, RunnerError, Stats};
use async_trait::async_trait;
use std::sync::Arc;

const CHILDREN: &[Related] = &[Related::ProductVariants, Related::ProductMedia, Related::ProductMetafields];

/// Options are saved inside the product document, so they get no row.
const BACKED_UP: [ResourceType; 4] = [
    ResourceType::Product,
    ResourceType::ProductVariant,
    ResourceType::ProductMedia,
    ResourceType::ProductMetaField,
];

/// Backs up every product with its variants, media and metafields to
/// `products/<id>/` of the backup.
pub struct ProductRunner {
    engine: Arc<Engine<Backup>>,
    client: GqlClient,
    stats: Stats,
}

impl ProductRunner {
    pub fn new(engine: Arc<Engine<Backup>>, client: GqlClient) -> Self {
        Self {
            engine,
            client,
            stats: Stats::new(),
        }
    }
}

#[async_trait]
impl Runner for ProductRunner {
    fn kind(&self) -> ResourceType {
        ResourceType::Product
    }

    async fn run(&mut self) -> Result<(), RunnerError> {
        let client = self.client.clone();
        self.stats = drive(
            &self.engine,
            ResourceType::Product,
            &BACKED_UP,
            "backup",
            move |engine| queue_all(engine, client, ResourceType::Product, CHILDREN),
        )
        .await?;
        Ok(())
    }

    fn stats(&self) -> &Stats {
        &self.stats
    }
}
