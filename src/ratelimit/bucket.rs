//! Token bucket limiting outbound API calls.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use crate::context::{Cancellation, Context};

/// Default bucket capacity.
pub const DEFAULT_MAX_REQUESTS: u32 = 3;
/// Default time for one token to be refilled.
pub const DEFAULT_REFILL_INTERVAL: Duration = Duration::from_secs(10);

/// A token bucket permitting at most `max_tokens` operations per
/// `refill_interval`.
///
/// Refill is computed lazily on each access. The bucket is thread-safe and
/// meant to be shared behind an `Arc`.
#[derive(Debug)]
pub struct TokenBucket {
    /// Mutable bookkeeping, only touched under this lock
    state: Mutex<BucketState>,
    /// Bucket capacity
    max_tokens: u32,
    /// Time for one token to be refilled
    refill_interval: Duration,
}

#[derive(Debug)]
struct BucketState {
    /// Always within `0..=max_tokens`
    tokens: u32,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// Zero values fall back to [`DEFAULT_MAX_REQUESTS`] and
    /// [`DEFAULT_REFILL_INTERVAL`].
    pub fn new(max_tokens: u32, refill_interval: Duration) -> Self {
        let max_tokens = if max_tokens == 0 {
            DEFAULT_MAX_REQUESTS
        } else {
            max_tokens
        };
        let refill_interval = if refill_interval.is_zero() {
            DEFAULT_REFILL_INTERVAL
        } else {
            refill_interval
        };

        Self {
            state: Mutex::new(BucketState {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
            max_tokens,
            refill_interval,
        }
    }

    /// Bucket capacity.
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Time for one token to be refilled.
    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    /// Tokens currently in the bucket, without applying a refill.
    pub fn available_tokens(&self) -> u32 {
        self.state.lock().tokens
    }

    /// Take one token, waiting for a refill if the bucket is empty.
    ///
    /// Returns immediately while tokens remain. Otherwise suspends until the
    /// next refill boundary or until `ctx` is done; in the latter case the
    /// cause is returned and no token is consumed.
    pub async fn acquire(&self, ctx: &Context) -> Result<(), Cancellation> {
        let wait = {
            let mut state = self.state.lock();
            let now = Instant::now();
            self.refill(&mut state, now);

            if state.tokens > 0 {
                state.tokens -= 1;
                trace!(remaining = state.tokens, "Token acquired");
                return Ok(());
            }

            let since_refill = now.duration_since(state.last_refill);
            self.refill_interval - remainder(since_refill, self.refill_interval)
        };

        debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting for refill");

        tokio::select! {
            biased;
            cause = ctx.done() => {
                debug!(cause = %cause, "Rate limit wait cancelled");
                Err(cause)
            }
            _ = sleep(wait) => {
                let mut state = self.state.lock();
                // The woken caller gets exactly one token, however long it slept.
                state.tokens = 1;
                state.last_refill = Instant::now();
                state.tokens -= 1;
                trace!("Token acquired after refill wait");
                Ok(())
            }
        }
    }

    /// Add one token per whole interval elapsed since the last refill.
    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.duration_since(state.last_refill);
        let intervals = elapsed.as_nanos() / self.refill_interval.as_nanos();
        if intervals == 0 {
            return;
        }

        let added = intervals.min(u128::from(self.max_tokens)) as u32;
        state.tokens = state.tokens.saturating_add(added).min(self.max_tokens);
        // Keep the partial interval for the next computation.
        state.last_refill = now - remainder(elapsed, self.refill_interval);

        trace!(
            added = added,
            tokens = state.tokens,
            "Refilled token bucket"
        );
    }
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_REFILL_INTERVAL)
    }
}

fn remainder(elapsed: Duration, interval: Duration) -> Duration {
    let nanos = elapsed.as_nanos() % interval.as_nanos();
    Duration::from_nanos(nanos as u64)
}
