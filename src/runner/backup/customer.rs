use super::provider::Related;
use super::queue_all;
use crate::api::GqlClient;
use crate::engine::{Backup, Engine, ResourceType};
use crate::runner::{drive, Runner, RunnerError, Stats};
use async_trait::async_trait;
use std::sync::Arc;

/// Backs up every customer with its metafields to `customers/<id>/`.
pub struct CustomerRunner {
    engine: Arc<Engine<Backup>>,
    client: GqlClient,
    stats: Stats,
}

impl CustomerRunner {
    pub fn new(engine: Arc<Engine<Backup>>, client: GqlClient) -> Self {
        Self {
            engine,
            client,
            stats: Stats::new(),
        }
    }
}

#[async_trait]
impl Runner for CustomerRunner {
    fn kind(&self) -> ResourceType {
        ResourceType::Customer
    }

    async fn run(&mut self) -> Result<(), RunnerError> {
        let client = self.client.clone();
        self.stats = drive(
            &self.engine,
            ResourceType::Customer,
            &ResourceType::customer_types(),
            "backup",
            move |engine| queue_all(engine, client, ResourceType::Customer, &[Related::CustomerMetafields]),
        )
        .await?;
        Ok(())
    }

    fn stats(&self) -> &Stats {
        &self.stats
    }
}
