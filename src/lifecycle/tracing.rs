//! # Observability & Tracing
//!
//! [`setup_tracing`] initializes structured logging with the `tracing` crate.
//! Log lines are compact and hide the module prefix (`with_target(false)`);
//! levels come from `RUST_LOG`.
//!
//! ## What Gets Traced
//!
//! - **Runs**: start and completion of every backup or restore, with per-type counts
//! - **Resources**: each parent and child a worker executes, with its path
//! - **Throttling**: credits reserved, waits for refill and reconciled bucket state
//! - **Errors**: failing resources with their type, path and reason
//!
//! ## Usage Examples
//!
//! ```bash
//! # Progress and summaries
//! RUST_LOG=info shop-sync backup
//!
//! # Every request cost and bucket update
//! RUST_LOG=debug shop-sync restore /tmp/bkp-1a2b3c4d5e
//!
//! # Only the rate limiter
//! RUST_LOG=shop_sync::api::throttle=trace shop-sync backup
//! ```
//!
//! With `RUST_LOG=info` a backup reads like:
//!
//! ```text
//! INFO Starting backup store="teststore.myshopify.com" id="bkp-1a2b3c4d5e" root="/tmp/backup_2026_10_17_09_30_00_bkp-1a2b3c4d5e"
//! INFO Workers started resource_type=product workers=3
//! ERROR Failed resource_type=product_media parent_type=product operation="backup" error=...
//! INFO Complete resource_type=product operation="backup" elapsed_ms=5120 passed=41 failed=1 skipped=0
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // resource_type fields identify the source
        .compact()
        .init();
}
