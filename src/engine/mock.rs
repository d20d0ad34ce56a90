//! # Mock Doers and Handlers
//!
//! Utilities for testing code built on the [`Engine`](super::Engine) without
//! touching the network or the filesystem.
//!
//! - [`MockHandler`] succeeds with a fixed payload, fails, or asks for its
//!   children to be skipped. It can also assert on the input it receives.
//! - [`MockDoer`] runs handlers directly while recording the order of calls
//!   and the highest number of resources it saw in flight at once.
//!
//! ```ignore
//! let engine = Engine::new(MockDoer::<u32>::new()).with_pool_size(2);
//! engine.register(ResourceType::Product);
//! let results = engine.run(ResourceType::Product)?;
//! engine.add(ResourceType::Product, ResourceCollection::new(
//!     Resource::new(ResourceType::Product, "products/1", MockHandler::succeed(1)),
//! )).await?;
//! engine.done(ResourceType::Product);
//! ```

use super::core::Doer;
use super::error::EngineError;
use super::resource::{Resource, ResourceHandler, ResourceType};
use async_trait::async_trait;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Error returned by failing mock handlers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct MockError(pub String);

#[derive(Debug, Clone)]
enum Behavior<T> {
    Succeed(T),
    Fail(String),
    Skip,
}

/// A handler with a scripted outcome.
#[derive(Debug, Clone)]
pub struct MockHandler<T> {
    behavior: Behavior<T>,
    expected_input: Option<T>,
}

impl<T> MockHandler<T> {
    pub fn succeed(output: T) -> Self {
        Self {
            behavior: Behavior::Succeed(output),
            expected_input: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            behavior: Behavior::Fail(message.into()),
            expected_input: None,
        }
    }

    pub fn skip() -> Self {
        Self {
            behavior: Behavior::Skip,
            expected_input: None,
        }
    }

    /// Fails unless the handler is given `input` by its parent.
    pub fn expect_input(mut self, input: T) -> Self {
        self.expected_input = Some(input);
        self
    }
}

#[async_trait]
impl<T> ResourceHandler<T> for MockHandler<T>
where
    T: Clone + PartialEq + Debug + Send + Sync,
{
    async fn handle(&self, _ctx: &CancellationToken, input: Option<&T>) -> Result<T, EngineError> {
        if let Some(expected) = &self.expected_input {
            if input != Some(expected) {
                return Err(EngineError::handler(MockError(format!(
                    "expected input {expected:?}, got {input:?}"
                ))));
            }
        }
        match &self.behavior {
            Behavior::Succeed(output) => Ok(output.clone()),
            Behavior::Fail(message) => Err(EngineError::handler(MockError(message.clone()))),
            Behavior::Skip => Err(EngineError::SkipChildren),
        }
    }
}

/// A doer that calls handlers directly and records what it did.
pub struct MockDoer<T> {
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<ResourceType>>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> MockDoer<T> {
    pub fn new() -> Self {
        Self {
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            _payload: PhantomData,
        }
    }

    /// Holds every resource for `delay` before running its handler.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Highest number of resources executed at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Resource types in the order they were executed.
    pub fn calls(&self) -> Vec<ResourceType> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl<T> Default for MockDoer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Doer for MockDoer<T> {
    type Payload = T;

    async fn execute(
        &self,
        ctx: &CancellationToken,
        resource: &Resource<T>,
        input: Option<&T>,
    ) -> Result<T, EngineError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(resource.kind);
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = resource.handler.handle(ctx, input).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
