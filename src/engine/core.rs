//! # Execution Engine
//!
//! The engine keeps one job channel per [`ResourceType`] and drains each of
//! them with a fixed-size pool of worker tasks.
//!
//! ## Key Types
//!
//! - [`Doer`]: the strategy that executes a resource (backup writes to disk,
//!   restore calls the API).
//! - [`Engine`]: registration, job submission, and the worker pools.
//! - [`ResourceResult`]: the outcome of one attempted resource.
//!
//! ## Sequencing
//!
//! A worker executes the parent of a [`ResourceCollection`] first. Only when the
//! parent succeeds are its children executed, in order, each receiving the
//! parent's output. A failed parent produces exactly one result and its
//! children produce none.

use super::error::EngineError;
use super::resource::{Resource, ResourceCollection, ResourceType};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Number of workers started per resource type unless configured otherwise.
pub const DEFAULT_POOL_SIZE: usize = 3;

// =============================================================================
// 1. THE ABSTRACTION
// =============================================================================

/// Executes a resource against a destination.
///
/// The associated `Payload` is what handlers produce and what a parent hands
/// down to its children. Implementations are shared by every worker of every
/// pool, so they must tolerate concurrent calls.
#[async_trait]
pub trait Doer: Send + Sync + 'static {
    type Payload: Send + Sync + 'static;

    async fn execute(
        &self,
        ctx: &CancellationToken,
        resource: &Resource<Self::Payload>,
        input: Option<&Self::Payload>,
    ) -> Result<Self::Payload, EngineError>;
}

/// Outcome of one attempted resource.
#[derive(Debug)]
pub struct ResourceResult {
    /// Type of the parent of the job this resource belongs to.
    pub parent_type: ResourceType,
    pub resource_type: ResourceType,
    pub error: Option<EngineError>,
}

impl ResourceResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_skipped(&self) -> bool {
        self.error.as_ref().is_some_and(EngineError::is_skip)
    }
}

// =============================================================================
// 2. THE ENGINE
// =============================================================================

type JobSender<T> = mpsc::Sender<ResourceCollection<T>>;
type JobReceiver<T> = mpsc::Receiver<ResourceCollection<T>>;

struct JobQueue<T> {
    sender: Option<JobSender<T>>,
    receiver: Option<JobReceiver<T>>,
}

/// Resource-type keyed worker pools around a single [`Doer`].
///
/// # Concurrency Model
/// Every registered type gets its own job channel and its own pool of
/// `pool_size` workers. Pools of different types run in parallel. The job map
/// is only locked to look a channel up; no lock is held while a producer waits
/// for a free worker.
pub struct Engine<D: Doer> {
    doer: Arc<D>,
    jobs: Mutex<HashMap<ResourceType, JobQueue<D::Payload>>>,
    pool_size: usize,
    cancel: CancellationToken,
}

impl<D: Doer> Engine<D> {
    pub fn new(doer: D) -> Self {
        Self {
            doer: Arc::new(doer),
            jobs: Mutex::new(HashMap::new()),
            pool_size: DEFAULT_POOL_SIZE,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the number of workers started per resource type. Values below one
    /// are raised to one.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    /// Uses `token` to stop the engine. Workers finish the resource they are
    /// executing and then exit; producers blocked in [`Engine::add`] return.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn doer(&self) -> &Arc<D> {
        &self.doer
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<ResourceType, JobQueue<D::Payload>>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates the job channel for `rt`.
    ///
    /// Must be called before [`add`](Self::add), [`run`](Self::run) and
    /// [`done`](Self::done) for that type. Registering again replaces the
    /// previous channel.
    pub fn register(&self, rt: ResourceType) {
        // Capacity 1 is the closest a bounded channel gets to a rendezvous:
        // producers wait as soon as every worker is busy.
        let (sender, receiver) = mpsc::channel(1);
        self.jobs().insert(
            rt,
            JobQueue {
                sender: Some(sender),
                receiver: Some(receiver),
            },
        );
        debug!(resource_type = %rt, "Registered");
    }

    /// Queues a job, waiting until a worker is ready to take it.
    pub async fn add(&self, rt: ResourceType, job: ResourceCollection<D::Payload>) -> Result<(), EngineError> {
        let sender = {
            let jobs = self.jobs();
            let queue = jobs.get(&rt).ok_or(EngineError::NotRegistered(rt))?;
            queue.sender.clone().ok_or(EngineError::Closed(rt))?
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EngineError::Cancelled),
            sent = sender.send(job) => sent.map_err(|_| EngineError::Closed(rt)),
        }
    }

    /// Starts the worker pool for `rt` and returns its result stream.
    ///
    /// The stream closes once [`done`](Self::done) was called and every queued
    /// job has been processed. It must be drained: workers wait for room in
    /// the stream before taking the next job.
    pub fn run(&self, rt: ResourceType) -> Result<mpsc::Receiver<ResourceResult>, EngineError> {
        let receiver = {
            let mut jobs = self.jobs();
            let queue = jobs.get_mut(&rt).ok_or(EngineError::NotRegistered(rt))?;
            queue.receiver.take().ok_or(EngineError::AlreadyRunning(rt))?
        };
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let (out, results) = mpsc::channel(self.pool_size);

        info!(resource_type = %rt, workers = self.pool_size, "Workers started");
        for worker in 0..self.pool_size {
            tokio::spawn(work(
                worker,
                rt,
                Arc::clone(&self.doer),
                Arc::clone(&receiver),
                out.clone(),
                self.cancel.clone(),
            ));
        }

        Ok(results)
    }

    /// Signals that no more jobs will be added for `rt`.
    pub fn done(&self, rt: ResourceType) {
        if let Some(queue) = self.jobs().get_mut(&rt) {
            if queue.sender.take().is_some() {
                debug!(resource_type = %rt, "No more jobs");
            }
        }
    }
}

// =============================================================================
// 3. THE WORKERS
// =============================================================================

async fn work<D: Doer>(
    worker: usize,
    rt: ResourceType,
    doer: Arc<D>,
    jobs: Arc<tokio::sync::Mutex<JobReceiver<D::Payload>>>,
    out: mpsc::Sender<ResourceResult>,
    cancel: CancellationToken,
) {
    let mut processed = 0usize;
    loop {
        let job = {
            let mut jobs = jobs.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                job = jobs.recv() => job,
            }
        };
        let Some(job) = job else { break };

        if execute_job(doer.as_ref(), &cancel, job, &out).await.is_err() {
            warn!(resource_type = %rt, worker, "Result stream dropped, stopping worker");
            break;
        }
        processed += 1;
    }

    if cancel.is_cancelled() {
        warn!(resource_type = %rt, worker, processed, "Worker cancelled");
    } else {
        debug!(resource_type = %rt, worker, processed, "Worker finished");
    }
}

/// Runs one job and reports every attempted resource on `out`.
async fn execute_job<D: Doer>(
    doer: &D,
    ctx: &CancellationToken,
    job: ResourceCollection<D::Payload>,
    out: &mpsc::Sender<ResourceResult>,
) -> Result<(), mpsc::error::SendError<ResourceResult>> {
    let ResourceCollection { parent, children } = job;
    let parent_type = parent.kind;

    let output = match doer.execute(ctx, &parent, None).await {
        Ok(output) => output,
        Err(err) => {
            debug!(resource_type = %parent_type, path = %parent.path.display(), error = %err, "Parent failed, skipping children");
            return out
                .send(ResourceResult {
                    parent_type,
                    resource_type: parent_type,
                    error: Some(err),
                })
                .await;
        }
    };
    out.send(ResourceResult {
        parent_type,
        resource_type: parent_type,
        error: None,
    })
    .await?;

    for child in children {
        if ctx.is_cancelled() {
            break;
        }
        let error = doer.execute(ctx, &child, Some(&output)).await.err();
        out.send(ResourceResult {
            parent_type,
            resource_type: child.kind,
            error,
        })
        .await?;
    }
    Ok(())
}

// =============================================================================
// 4. TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{MockDoer, MockHandler};
    use std::time::Duration;

    fn product(handler: MockHandler<u32>) -> Resource<u32> {
        Resource::new(ResourceType::Product, "products/1", handler)
    }

    async fn collect(mut results: mpsc::Receiver<ResourceResult>) -> Vec<ResourceResult> {
        let mut collected = Vec::new();
        while let Some(res) = results.recv().await {
            collected.push(res);
        }
        collected
    }

    #[tokio::test]
    async fn test_children_run_after_parent_in_order() {
        let engine = Arc::new(Engine::new(MockDoer::<u32>::new()));
        engine.register(ResourceType::Product);
        let results = engine.run(ResourceType::Product).unwrap();

        let producer = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let job = ResourceCollection::new(product(MockHandler::succeed(7)))
                    .with_child(Resource::new(
                        ResourceType::ProductVariant,
                        "products/1",
                        MockHandler::succeed(1).expect_input(7),
                    ))
                    .with_child(Resource::new(
                        ResourceType::ProductMedia,
                        "products/1",
                        MockHandler::fail("media unavailable"),
                    ));
                engine.add(ResourceType::Product, job).await.unwrap();
                engine.done(ResourceType::Product);
            })
        };

        let collected = collect(results).await;
        producer.await.unwrap();

        assert_eq!(collected.len(), 3);
        assert_eq!(collected[0].resource_type, ResourceType::Product);
        assert!(collected[0].is_ok());
        assert_eq!(collected[1].resource_type, ResourceType::ProductVariant);
        assert_eq!(collected[1].parent_type, ResourceType::Product);
        assert!(collected[1].is_ok());
        assert_eq!(collected[2].resource_type, ResourceType::ProductMedia);
        assert!(collected[2].error.is_some());
        assert_eq!(
            engine.doer().calls(),
            vec![ResourceType::Product, ResourceType::ProductVariant, ResourceType::ProductMedia]
        );
    }

    #[tokio::test]
    async fn test_failed_parent_skips_children() {
        let engine = Engine::new(MockDoer::<u32>::new());
        engine.register(ResourceType::Product);
        let results = engine.run(ResourceType::Product).unwrap();

        let job = ResourceCollection::new(product(MockHandler::fail("boom")))
            .with_child(Resource::new(ResourceType::ProductVariant, "products/1", MockHandler::succeed(1)))
            .with_child(Resource::new(ResourceType::ProductMedia, "products/1", MockHandler::succeed(2)));
        engine.add(ResourceType::Product, job).await.unwrap();
        engine.done(ResourceType::Product);

        let collected = collect(results).await;
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].resource_type, ResourceType::Product);
        assert!(collected[0].error.is_some());
        assert_eq!(engine.doer().calls(), vec![ResourceType::Product]);
    }

    #[tokio::test]
    async fn test_skip_children_is_reported_on_parent() {
        let engine = Engine::new(MockDoer::<u32>::new());
        engine.register(ResourceType::Customer);
        let results = engine.run(ResourceType::Customer).unwrap();

        let job = ResourceCollection::new(Resource::new(ResourceType::Customer, "customers/1", MockHandler::skip()))
            .with_child(Resource::new(ResourceType::CustomerMetaField, "customers/1", MockHandler::succeed(1)));
        engine.add(ResourceType::Customer, job).await.unwrap();
        engine.done(ResourceType::Customer);

        let collected = collect(results).await;
        assert_eq!(collected.len(), 1);
        assert!(collected[0].is_skipped());
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_pool_size() {
        let engine = Arc::new(Engine::new(MockDoer::<u32>::new().with_delay(Duration::from_millis(5))).with_pool_size(2));
        engine.register(ResourceType::Product);
        let results = engine.run(ResourceType::Product).unwrap();

        let producer = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                for i in 0..20 {
                    let job = ResourceCollection::new(product(MockHandler::succeed(i)))
                        .with_child(Resource::new(ResourceType::ProductVariant, "products/1", MockHandler::succeed(i)));
                    engine.add(ResourceType::Product, job).await.unwrap();
                }
                engine.done(ResourceType::Product);
            })
        };

        let collected = collect(results).await;
        producer.await.unwrap();

        assert_eq!(collected.len(), 40);
        assert!(engine.doer().max_in_flight() <= 2);
        assert!(engine.doer().max_in_flight() >= 1);
    }

    #[tokio::test]
    async fn test_stream_closes_after_done_without_jobs() {
        let engine = Engine::new(MockDoer::<u32>::new());
        engine.register(ResourceType::Product);
        let results = engine.run(ResourceType::Product).unwrap();
        engine.done(ResourceType::Product);

        let collected = tokio::time::timeout(Duration::from_secs(5), collect(results))
            .await
            .expect("result stream did not close");
        assert!(collected.is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_type_is_rejected() {
        let engine = Engine::new(MockDoer::<u32>::new());
        let job = ResourceCollection::new(product(MockHandler::succeed(1)));

        assert!(matches!(
            engine.add(ResourceType::Product, job).await,
            Err(EngineError::NotRegistered(ResourceType::Product))
        ));
        assert!(matches!(
            engine.run(ResourceType::Customer),
            Err(EngineError::NotRegistered(ResourceType::Customer))
        ));
    }

    #[tokio::test]
    async fn test_run_twice_and_add_after_done() {
        let engine = Engine::new(MockDoer::<u32>::new());
        engine.register(ResourceType::Product);
        let _results = engine.run(ResourceType::Product).unwrap();
        assert!(matches!(
            engine.run(ResourceType::Product),
            Err(EngineError::AlreadyRunning(ResourceType::Product))
        ));

        engine.done(ResourceType::Product);
        engine.done(ResourceType::Product);
        let job = ResourceCollection::new(product(MockHandler::succeed(1)));
        assert!(matches!(
            engine.add(ResourceType::Product, job).await,
            Err(EngineError::Closed(ResourceType::Product))
        ));
    }

    #[tokio::test]
    async fn test_cancellation_stops_workers_and_producers() {
        let token = CancellationToken::new();
        let engine = Engine::new(MockDoer::<u32>::new()).with_pool_size(1).with_cancellation(token.clone());
        engine.register(ResourceType::Product);
        let results = engine.run(ResourceType::Product).unwrap();

        token.cancel();
        let job = ResourceCollection::new(product(MockHandler::succeed(1)));
        assert!(matches!(
            engine.add(ResourceType::Product, job).await,
            Err(EngineError::Cancelled)
        ));

        // Workers exit on cancellation even though `done` was never called.
        let collected = tokio::time::timeout(Duration::from_secs(5), collect(results))
            .await
            .expect("workers did not stop");
        assert!(collected.is_empty());
    }

    #[tokio::test]
    async fn test_pools_of_different_types_are_independent() {
        let engine = Arc::new(Engine::new(MockDoer::<u32>::new()));
        engine.register(ResourceType::Product);
        engine.register(ResourceType::Customer);
        let products = engine.run(ResourceType::Product).unwrap();
        let customers = engine.run(ResourceType::Customer).unwrap();

        engine.done(ResourceType::Product);
        engine
            .add(
                ResourceType::Customer,
                ResourceCollection::new(Resource::new(ResourceType::Customer, "customers/1", MockHandler::succeed(1))),
            )
            .await
            .unwrap();
        engine.done(ResourceType::Customer);

        assert!(collect(products).await.is_empty());
        assert_eq!(collect(customers).await.len(), 1);
    }
}
