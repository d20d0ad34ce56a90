//! Admin API access: the GraphQL client and the rate limiter every request
//! goes through.
//!
//! # Main Components
//!
//! - [`GqlClient`] - queries and mutations, see [`product`] and [`customer`]
//! - [`Throttler`] - token bucket mirrored from the server's own accounting
//! - [`ThrottledTransport`] - paces requests and reconciles the bucket
//! - [`ApiError`] - everything that can fail along the way
//!
//! ```text
//! GqlClient ──► ThrottledTransport ──► reqwest::Client ──► Admin API
//!                    │      ▲
//!               wait(cost)  └── reconcile(throttleStatus)
//!                    ▼
//!                Throttler (shared)
//! ```

pub mod client;
pub mod customer;
pub mod error;
pub mod mock;
pub mod product;
pub mod throttle;
pub mod transport;
pub mod types;

pub use client::{GqlClient, API_VERSION};
pub use customer::{CustomerIdentity, CUSTOMERS_PER_PAGE};
pub use error::ApiError;
pub use product::PRODUCTS_PER_PAGE;
pub use throttle::{ThrottleError, ThrottleStatus, Throttler, DEFAULT_MAX_CREDITS, DEFAULT_RESTORE_RATE};
pub use transport::{RawResponse, RoundTrip, ThrottledTransport, HEADER_QUERY_COST};
pub use types::{Page, PageInfo};
