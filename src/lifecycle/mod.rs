//! Runtime orchestration and lifecycle management.
//!
//! - **System orchestration**: wiring the throttled HTTP stack, engines and runners
//! - **Cancellation**: one token shared by every operation of a [`SyncSystem`]
//! - **Observability setup**: initializing tracing and logging
//!
//! # Main Components
//!
//! - [`SyncSystem`] - runs backups and restores for one store
//! - [`setup_tracing`] - initializes the tracing/logging infrastructure

pub mod sync_system;
pub mod tracing;

pub use sync_system::*;
pub use tracing::*;
