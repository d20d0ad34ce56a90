//! # Runners
//!
//! A runner owns one top-level resource type for one direction. It feeds the
//! shared [`Engine`] with jobs and folds the result stream into [`Stats`]:
//!
//! ```text
//! producer task ──add()──► Engine pool ──ResourceResult──► Summary per type
//!      │                                                     ▲
//!      └── done() when exhausted, failed, or panicked        │
//!                                                        run() drains
//! ```
//!
//! Producers read from the API for [`backup`] and from disk for [`restore`].

pub mod backup;
pub mod error;
pub mod restore;

pub use error::RunnerError;

use crate::engine::{Doer, Engine, ResourceResult, ResourceType};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome counters for one resource type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub count: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn record(&mut self, result: &ResourceResult) {
        self.count += 1;
        match &result.error {
            None => self.passed += 1,
            Some(err) if err.is_skip() => self.skipped += 1,
            Some(_) => self.failed += 1,
        }
    }
}

/// Counters per resource type.
pub type Stats = BTreeMap<ResourceType, Summary>;

#[async_trait]
pub trait Runner: Send {
    /// Top-level type this runner produces jobs for.
    fn kind(&self) -> ResourceType;

    /// Produces every job, drains the results and returns once the engine
    /// closed the result stream.
    async fn run(&mut self) -> Result<(), RunnerError>;

    /// Counters of the last run.
    fn stats(&self) -> &Stats;
}

/// Calls [`Engine::done`] when dropped, so a failed or panicking producer
/// still lets the result stream close.
struct DoneGuard<D: Doer> {
    engine: Arc<Engine<D>>,
    kind: ResourceType,
}

impl<D: Doer> Drop for DoneGuard<D> {
    fn drop(&mut self) {
        self.engine.done(self.kind);
    }
}

/// Registers `kind`, spawns `produce`, and counts every result until the
/// stream closes.
///
/// `types` are the resource types the runner reports on; each starts at zero.
pub(crate) async fn drive<D, P, F>(
    engine: &Arc<Engine<D>>,
    kind: ResourceType,
    types: &[ResourceType],
    operation: &'static str,
    produce: P,
) -> Result<Stats, RunnerError>
where
    D: Doer,
    P: FnOnce(Arc<Engine<D>>) -> F,
    F: Future<Output = Result<usize, RunnerError>> + Send + 'static,
{
    let started = Instant::now();
    engine.register(kind);
    let mut results = engine.run(kind)?;

    let guard = DoneGuard {
        engine: Arc::clone(engine),
        kind,
    };
    let production = produce(Arc::clone(engine));
    let producer = tokio::spawn(async move {
        let _guard = guard;
        production.await
    });

    let mut stats: Stats = types.iter().map(|rt| (*rt, Summary::default())).collect();
    while let Some(result) = results.recv().await {
        match &result.error {
            None => debug!(resource_type = %result.resource_type, operation, "Done"),
            Some(err) if err.is_skip() => {
                debug!(resource_type = %result.resource_type, operation, "Skipped")
            }
            Some(err) => error!(
                resource_type = %result.resource_type,
                parent_type = %result.parent_type,
                operation,
                error = %err,
                "Failed"
            ),
        }
        stats.entry(result.resource_type).or_default().record(&result);
    }

    match producer.await? {
        Ok(produced) => debug!(resource_type = %kind, operation, produced, "All jobs queued"),
        Err(err) => warn!(resource_type = %kind, operation, error = %err, "Stopped queueing jobs"),
    }

    let summary = stats.get(&kind).copied().unwrap_or_default();
    info!(
        resource_type = %kind,
        operation,
        elapsed_ms = started.elapsed().as_millis() as u64,
        passed = summary.passed,
        failed = summary.failed,
        skipped = summary.skipped,
        "Complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{MockDoer, MockHandler};
    use crate::engine::{EngineError, Resource, ResourceCollection};

    fn result(error: Option<EngineError>) -> ResourceResult {
        ResourceResult {
            parent_type: ResourceType::Product,
            resource_type: ResourceType::Product,
            error,
        }
    }

    #[test]
    fn test_summary_counts_each_outcome() {
        let mut summary = Summary::default();
        summary.record(&result(None));
        summary.record(&result(Some(EngineError::SkipChildren)));
        summary.record(&result(Some(EngineError::Cancelled)));
        summary.record(&result(None));

        assert_eq!(
            summary,
            Summary {
                count: 4,
                passed: 2,
                failed: 1,
                skipped: 1
            }
        );
    }

    #[tokio::test]
    async fn test_drive_counts_per_type() {
        let engine = Arc::new(Engine::new(MockDoer::<u32>::new()));
        let stats = drive(
            &engine,
            ResourceType::Customer,
            &ResourceType::customer_types(),
            "test",
            |engine| async move {
                for handler in [MockHandler::succeed(1), MockHandler::skip(), MockHandler::fail("boom")] {
                    let job = ResourceCollection::new(Resource::new(ResourceType::Customer, "customers/1", handler))
                        .with_child(Resource::new(
                            ResourceType::CustomerMetaField,
                            "customers/1",
                            MockHandler::succeed(2),
                        ));
                    engine.add(ResourceType::Customer, job).await?;
                }
                Ok::<_, RunnerError>(3)
            },
        )
        .await
        .unwrap();

        assert_eq!(
            stats[&ResourceType::Customer],
            Summary {
                count: 3,
                passed: 1,
                failed: 1,
                skipped: 1
            }
        );
        assert_eq!(stats[&ResourceType::CustomerMetaField].passed, 1);
        assert_eq!(stats[&ResourceType::CustomerMetaField].count, 1);
    }

    #[tokio::test]
    async fn test_drive_finishes_when_producer_fails() {
        let engine = Arc::new(Engine::new(MockDoer::<u32>::new()));
        let stats = drive(&engine, ResourceType::Product, &[ResourceType::Product], "test", |_| async {
            Err::<usize, _>(RunnerError::InvalidFilter("nope".into()))
        })
        .await
        .unwrap();

        assert_eq!(stats[&ResourceType::Product], Summary::default());
    }
}
