use crate::api::{GqlClient, ThrottledTransport, Throttler};
use crate::config::{Config, ConfigError};
use crate::engine::{Backup, Engine, ResourceType, Restore};
use crate::runner::restore::RestoreOptions;
use crate::runner::{backup, restore, Runner, RunnerError, Stats};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0} cannot be backed up or restored on its own")]
    NotPrimary(ResourceType),
    #[error("runner task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Outcome of one runner.
#[derive(Debug)]
pub struct RunnerReport {
    pub kind: ResourceType,
    pub stats: Stats,
    /// Set when the runner failed outright, e.g. its producer task panicked.
    pub error: Option<RunnerError>,
}

impl RunnerReport {
    /// Resources that failed, over every type the runner reports on.
    pub fn failed(&self) -> usize {
        self.stats.values().map(|summary| summary.failed).sum()
    }
}

#[derive(Debug)]
pub struct BackupReport {
    pub id: String,
    /// Folder the backup was written to.
    pub root: PathBuf,
    pub runners: Vec<RunnerReport>,
}

/// The orchestrator for backups and restores of one store.
///
/// `SyncSystem` is responsible for:
/// - **Wiring**: one [`Throttler`] behind one [`ThrottledTransport`] behind
///   the [`GqlClient`] every runner shares
/// - **Lifecycle**: a fresh [`Engine`] per operation, with one runner per
///   requested top-level type, all running concurrently
/// - **Shutdown**: [`cancel`](Self::cancel) stops producers, workers and
///   requests waiting for credits
///
/// # Example
///
/// ```ignore
/// let system = SyncSystem::new(Config::load(path)?.apply_env())?;
/// let report = system.backup(&ResourceType::primary()).await?;
/// println!("backup {} written to {}", report.id, report.root.display());
/// ```
pub struct SyncSystem {
    config: Config,
    client: GqlClient,
    throttler: Arc<Throttler>,
    cancel: CancellationToken,
}

impl SyncSystem {
    /// Validates `config` and wires the HTTP stack for its store.
    pub fn new(config: Config) -> Result<Self, SystemError> {
        config.validate()?;
        let throttler = Arc::new(Throttler::new(config.max_credits, config.restore_rate));
        let transport = ThrottledTransport::new(reqwest::Client::new(), Arc::clone(&throttler));
        let client = GqlClient::new(&config.store, config.access_token.clone(), Arc::new(transport));
        Ok(Self::from_parts(config, client, throttler))
    }

    /// Uses an already wired client, e.g. one backed by a scripted transport.
    pub fn from_parts(config: Config, client: GqlClient, throttler: Arc<Throttler>) -> Self {
        Self {
            config,
            client,
            throttler,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn throttler(&self) -> &Arc<Throttler> {
        &self.throttler
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops every running operation. Resources already being executed finish.
    pub fn cancel(&self) {
        warn!("Cancelling all operations");
        self.cancel.cancel();
    }

    /// Backs up `kinds` into a new folder below the configured backup dir.
    pub async fn backup(&self, kinds: &[ResourceType]) -> Result<BackupReport, SystemError> {
        check_primary(kinds)?;
        let doer = Backup::new(&self.config.store)
            .with_dir(&self.config.backup_dir)
            .with_prefix(&self.config.backup_prefix);
        let (id, root) = (doer.id().to_string(), doer.root());
        info!(store = %self.config.store, %id, root = %root.display(), "Starting backup");

        let engine = Arc::new(
            Engine::new(doer)
                .with_pool_size(self.config.pool_size)
                .with_cancellation(self.cancel.child_token()),
        );
        let runners = kinds
            .iter()
            .map(|kind| -> Result<Box<dyn Runner>, SystemError> {
                let (engine, client) = (Arc::clone(&engine), self.client.clone());
                match kind {
                    ResourceType::Product => Ok(Box::new(backup::ProductRunner::new(engine, client))),
                    ResourceType::Customer => Ok(Box::new(backup::CustomerRunner::new(engine, client))),
                    dependent @ (ResourceType::ProductOption
                    | ResourceType::ProductVariant
                    | ResourceType::ProductMedia
                    | ResourceType::ProductMetaField
                    | ResourceType::CustomerMetaField) => Err(SystemError::NotPrimary(*dependent)),
                }
            })
            .collect::<Result<_, _>>()?;

        let runners = run_all(runners).await?;
        Ok(BackupReport { id, root, runners })
    }

    /// Restores `kinds` from the backup folder at `root`.
    pub async fn restore(
        &self,
        root: &Path,
        kinds: &[ResourceType],
        options: RestoreOptions,
    ) -> Result<Vec<RunnerReport>, SystemError> {
        check_primary(kinds)?;
        let options = Arc::new(RestoreOptions {
            dry_run: options.dry_run || self.config.dry_run,
            ..options
        });
        info!(store = %self.config.store, root = %root.display(), dry_run = options.dry_run, "Starting restore");

        let engine = Arc::new(
            Engine::new(Restore::new(&self.config.store))
                .with_pool_size(self.config.pool_size)
                .with_cancellation(self.cancel.child_token()),
        );
        let runners = kinds
            .iter()
            .map(|kind| -> Result<Box<dyn Runner>, SystemError> {
                let (engine, client, options) = (Arc::clone(&engine), self.client.clone(), Arc::clone(&options));
                match kind {
                    ResourceType::Product => Ok(Box::new(restore::ProductRunner::new(engine, client, root, options))),
                    ResourceType::Customer => Ok(Box::new(restore::CustomerRunner::new(engine, client, root, options))),
                    dependent @ (ResourceType::ProductOption
                    | ResourceType::ProductVariant
                    | ResourceType::ProductMedia
                    | ResourceType::ProductMetaField
                    | ResourceType::CustomerMetaField) => Err(SystemError::NotPrimary(*dependent)),
                }
            })
            .collect::<Result<_, _>>()?;

        run_all(runners).await
    }

    /// Cancels whatever is still running and logs the final bucket state.
    pub fn shutdown(self) {
        self.cancel.cancel();
        info!(credits = self.throttler.tokens(), "Shutdown complete");
    }
}

fn check_primary(kinds: &[ResourceType]) -> Result<(), SystemError> {
    match kinds.iter().find(|kind| !kind.is_primary()) {
        Some(kind) => Err(SystemError::NotPrimary(*kind)),
        None => Ok(()),
    }
}

/// Runs every runner in its own task and waits for all of them.
async fn run_all(runners: Vec<Box<dyn Runner>>) -> Result<Vec<RunnerReport>, SystemError> {
    let handles: Vec<_> = runners
        .into_iter()
        .map(|mut runner| {
            tokio::spawn(async move {
                let outcome = runner.run().await;
                if let Err(err) = &outcome {
                    error!(resource_type = %runner.kind(), error = %err, "Runner failed");
                }
                RunnerReport {
                    kind: runner.kind(),
                    stats: runner.stats().clone(),
                    error: outcome.err(),
                }
            })
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        reports.push(handle.await?);
    }
    Ok(reports)
}
