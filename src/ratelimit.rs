//! Outbound send-rate limiting.
//!
//! A [`RateLimiter`] holds a pool of `capacity` tokens. Every rate-limited
//! send takes one token; a background task tops the pool back up to
//! capacity once per `period`, adding only the tokens that were consumed.
//!
//! The limiter is cheap to clone, and clones share one pool, so a single
//! limiter can gate several connections that count against the same
//! server-side budget.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use chatwire::RateLimiter;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> chatwire::Result<()> {
//! // 20 messages per 30 seconds
//! let limiter = RateLimiter::new(20, Duration::from_secs(30));
//! let cancel = CancellationToken::new();
//!
//! limiter.acquire(&cancel).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::{ChatwireError, Result};

/// Shortest accepted refill period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

struct Inner {
    /// Available tokens.
    tokens: Semaphore,
    capacity: usize,
    period: Duration,
    /// Stops the refill task.
    shutdown: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Token-pool rate limiter shared across connections.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    /// Create a limiter with a full pool and spawn its refill task.
    ///
    /// `capacity` is clamped to `1..=Semaphore::MAX_PERMITS` and `period`
    /// to at least one millisecond. Must be called from within a tokio
    /// runtime.
    pub fn new(capacity: usize, period: Duration) -> Self {
        let capacity = clamp_capacity(capacity);
        let period = clamp_period(period);
        let inner = Arc::new(Inner {
            tokens: Semaphore::new(capacity),
            capacity,
            period,
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(refill_loop(Arc::downgrade(&inner), inner.shutdown.clone()));

        Self { inner }
    }

    /// Take one token, waiting for the next refill if the pool is empty.
    ///
    /// Returns `Err(Cancelled)` as soon as `cancel` fires, without
    /// consuming a token, and `Err(Closed)` if the limiter is shut down.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChatwireError::Cancelled),
            permit = self.inner.tokens.acquire() => match permit {
                Ok(permit) => {
                    permit.forget();
                    Ok(())
                }
                Err(_) => Err(ChatwireError::Closed),
            },
        }
    }

    /// Take one token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        match self.inner.tokens.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Tokens currently in the pool.
    #[inline]
    pub fn available(&self) -> usize {
        self.inner.tokens.available_permits()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.inner.period
    }

    /// Stop refilling and release every blocked caller with `Err(Closed)`.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.tokens.close();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.tokens.is_closed()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("capacity", &self.inner.capacity)
            .field("period", &self.inner.period)
            .field("available", &self.available())
            .finish()
    }
}

fn clamp_capacity(capacity: usize) -> usize {
    let clamped = capacity.clamp(1, Semaphore::MAX_PERMITS);
    if clamped != capacity {
        tracing::warn!(capacity, clamped, "rate limiter capacity out of range");
    }
    clamped
}

fn clamp_period(period: Duration) -> Duration {
    if period < MIN_PERIOD {
        tracing::warn!(?period, "rate limiter period too short, using {:?}", MIN_PERIOD);
        return MIN_PERIOD;
    }
    period
}

async fn refill_loop(inner: Weak<Inner>, shutdown: CancellationToken) {
    let Some(period) = inner.upgrade().map(|i| i.period) else {
        return;
    };
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let deficit = inner
                    .capacity
                    .saturating_sub(inner.tokens.available_permits());
                if deficit > 0 {
                    inner.tokens.add_permits(deficit);
                    tracing::trace!(deficit, "rate limiter refilled");
                }
            }
        }
    }
}
