//! # Adaptive Rate Limiter
//!
//! A local mirror of the Admin API's leaky bucket. Every request reserves its
//! declared cost before it is sent; every response tells us how many credits
//! the server thinks are left, and the bucket is reconciled to that figure.
//!
//! See <https://shopify.dev/docs/api/usage/rate-limits>.

use serde::Deserialize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Bucket capacity of the Admin API.
pub const DEFAULT_MAX_CREDITS: f64 = 2000.0;
/// Credits restored per second by the Admin API.
pub const DEFAULT_RESTORE_RATE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThrottleError {
    #[error("wait for credits cancelled")]
    Cancelled,
    #[error("requested {requested} credits, bucket holds at most {capacity}")]
    ExceedsCapacity { requested: u32, capacity: f64 },
}

/// Bucket state as reported by the server in `extensions.cost.throttleStatus`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThrottleStatus {
    pub maximum_available: f64,
    pub currently_available: f64,
    pub restore_rate: f64,
}

#[derive(Debug)]
struct Bucket {
    max_credits: f64,
    restore_rate: f64,
    /// Negative while callers wait for reserved credits.
    tokens: f64,
    updated_at: Instant,
}

impl Bucket {
    fn advance(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.updated_at).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.restore_rate).min(self.max_credits);
        self.updated_at = now;
    }
}

/// Token bucket shared by every request sent through a
/// [`ThrottledTransport`](super::ThrottledTransport).
#[derive(Debug)]
pub struct Throttler {
    bucket: Mutex<Bucket>,
}

impl Throttler {
    /// Creates a full bucket. Non-positive values fall back to the API defaults.
    pub fn new(max_credits: f64, restore_rate: f64) -> Self {
        let max_credits = if max_credits > 0.0 { max_credits } else { DEFAULT_MAX_CREDITS };
        let restore_rate = if restore_rate > 0.0 { restore_rate } else { DEFAULT_RESTORE_RATE };
        Self {
            bucket: Mutex::new(Bucket {
                max_credits,
                restore_rate,
                tokens: max_credits,
                updated_at: Instant::now(),
            }),
        }
    }

    fn bucket(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn max_credits(&self) -> f64 {
        self.bucket().max_credits
    }

    pub fn restore_rate(&self) -> f64 {
        self.bucket().restore_rate
    }

    /// Credits available right now. Negative while waiters hold reservations.
    pub fn tokens(&self) -> f64 {
        let mut bucket = self.bucket();
        bucket.advance(Instant::now());
        bucket.tokens
    }

    /// Waits until `n` credits are available and consumes them.
    ///
    /// Returns [`ThrottleError::Cancelled`] as soon as `ctx` is cancelled; the
    /// reserved credits are handed back in that case.
    pub async fn wait(&self, ctx: &CancellationToken, n: u32) -> Result<(), ThrottleError> {
        if ctx.is_cancelled() {
            return Err(ThrottleError::Cancelled);
        }

        let delay = {
            let mut bucket = self.bucket();
            if f64::from(n) > bucket.max_credits {
                return Err(ThrottleError::ExceedsCapacity {
                    requested: n,
                    capacity: bucket.max_credits,
                });
            }
            bucket.advance(Instant::now());
            bucket.tokens -= f64::from(n);
            if bucket.tokens >= 0.0 {
                Duration::ZERO
            } else {
                Duration::try_from_secs_f64(-bucket.tokens / bucket.restore_rate).unwrap_or(Duration::MAX)
            }
        };
        if delay.is_zero() {
            return Ok(());
        }

        debug!(cost = n, wait_ms = delay.as_millis() as u64, "Waiting for credits");
        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                let mut bucket = self.bucket();
                bucket.tokens = (bucket.tokens + f64::from(n)).min(bucket.max_credits);
                Err(ThrottleError::Cancelled)
            }
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Moves the local bucket to the state the server reported.
    pub fn reconcile(&self, status: &ThrottleStatus) {
        let mut bucket = self.bucket();
        bucket.advance(Instant::now());

        if status.maximum_available > 0.0 {
            bucket.max_credits = status.maximum_available;
        }
        if status.restore_rate > 0.0 {
            bucket.restore_rate = status.restore_rate;
        }

        let delta = status.currently_available - bucket.tokens;
        bucket.tokens = (bucket.tokens + delta).min(bucket.max_credits);
        debug!(delta, tokens = bucket.tokens, max = bucket.max_credits, "Reconciled credits");
    }
}

impl Default for Throttler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CREDITS, DEFAULT_RESTORE_RATE)
    }
}
