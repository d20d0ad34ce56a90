//! Generic execution engine for backup and restore jobs.
//!
//! # Main Components
//!
//! - [`ResourceType`], [`Resource`], [`ResourceCollection`] - what gets executed
//! - [`Engine`] - resource-type keyed worker pools
//! - [`Doer`] - how a resource is executed; see [`Backup`] and [`Restore`]
//! - [`EngineError`] - everything that can fail along the way
//!
//! # Testing
//!
//! See the [`mock`] module for handlers and doers that need neither disk nor network.

pub mod backup;
pub mod core;
pub mod error;
pub mod mock;
pub mod resource;
pub mod restore;
pub mod util;

pub use self::core::*;
pub use backup::Backup;
pub use error::EngineError;
pub use resource::*;
pub use restore::{RemoteId, Restore};
pub use util::extract_numeric_id;
