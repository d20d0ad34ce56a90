//! # shop-sync
//!
//! > **Backup and restore for a store's products and customers, paced by the
//! > GraphQL Admin API's cost-based rate limit.**
//!
//! ## 🏗️ Design Philosophy
//!
//! A backup or restore is a stream of small, independent units of work: one
//! product with its variants, media and metafields, or one customer with its
//! metafields. The crate separates three concerns:
//!
//! - **Scheduling**: a worker pool per resource type that runs a parent and
//!   then its children, in order, skipping the children when the parent fails.
//! - **Direction**: the same engine either writes what a handler fetched
//!   ([`Backup`](engine::Backup)) or pushes stored documents back
//!   ([`Restore`](engine::Restore)).
//! - **Pacing**: every request declares its cost up front and waits for
//!   credits in a leaky bucket that the server's own figures keep honest.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Engine ([`engine`])
//! - **Role**: Keyed worker pools, parent/child ordering, one result per resource.
//! - **Key items**: [`Engine`](engine::Engine), [`Doer`](engine::Doer),
//!   [`ResourceCollection`](engine::ResourceCollection).
//!
//! ### 2. The Runners ([`runner`])
//! - **Role**: Produce jobs for one top-level type and fold results into a
//!   [`Summary`](runner::Summary) per type.
//! - **Key items**: [`Runner`](runner::Runner), [`backup`](runner::backup),
//!   [`restore`](runner::restore).
//!
//! ### 3. The API ([`api`])
//! - **Role**: GraphQL client, throttled transport and the queries themselves.
//! - **Key items**: [`GqlClient`](api::GqlClient),
//!   [`ThrottledTransport`](api::ThrottledTransport), [`Throttler`](api::Throttler).
//!
//! ### 4. The Orchestrator ([`lifecycle`])
//! - **Role**: Wires config, transport, engines and runners; owns cancellation.
//! - **Key items**: [`SyncSystem`](lifecycle::SyncSystem),
//!   [`setup_tracing`](lifecycle::setup_tracing).
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Back up everything with progress logs
//! RUST_LOG=info SHOPIFY_STORE=teststore.myshopify.com SHOPIFY_ACCESS_TOKEN=shpat_... shop-sync backup
//!
//! # See what a restore would touch
//! shop-sync restore /tmp/backup_2026_10_17_09_30_00_bkp-1a2b3c4d5e --dry-run
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```
//!
//! Tests never reach the network: [`api::mock::ScriptedTransport`] answers
//! requests from canned GraphQL responses.

pub mod api;
pub mod config;
pub mod engine;
pub mod lifecycle;
pub mod runner;
