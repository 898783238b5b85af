//! Caller-side cancellation for rate limit waits and in-flight requests.
//!
//! A [`Context`] resolves once when it is cancelled through its
//! [`CancelHandle`] or when its deadline passes. Clones observe the same
//! signal, so one handle can abort many concurrent submissions.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

/// Why a [`Context`] is done.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    /// Cancelled explicitly through a [`CancelHandle`]
    #[error("context canceled")]
    Cancelled,
    /// The context deadline passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// A cancellation signal with an optional deadline.
#[derive(Debug, Clone)]
pub struct Context {
    rx: watch::Receiver<Option<Cancellation>>,
    deadline: Option<Instant>,
}

/// Cancels every clone of the [`Context`] it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<Option<Cancellation>>>,
}

impl CancelHandle {
    /// Cancel the associated context. Later calls are no-ops.
    pub fn cancel(&self) {
        self.tx.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(Cancellation::Cancelled);
            true
        });
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        // The sender is dropped right away; `done` treats a closed channel as
        // "never cancelled".
        let (_tx, rx) = watch::channel(None);
        Self { rx, deadline: None }
    }

    /// A context that can be cancelled through the returned handle.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(None);
        (
            Self { rx, deadline: None },
            CancelHandle { tx: Arc::new(tx) },
        )
    }

    /// Derive a context that is additionally done after `timeout`.
    ///
    /// An earlier existing deadline wins. A timeout too large to represent
    /// adds no deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// Derive a context that is additionally done at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing <= deadline => existing,
            _ => deadline,
        };
        Self {
            rx: self.rx.clone(),
            deadline: Some(deadline),
        }
    }

    /// The deadline of this context, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the cancellation cause if the context is already done.
    pub fn err(&self) -> Option<Cancellation> {
        if let Some(cause) = *self.rx.borrow() {
            return Some(cause);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Cancellation::DeadlineExceeded),
            _ => None,
        }
    }

    /// Wait until the context is done and return why.
    ///
    /// Never resolves for a context without a deadline whose handle was
    /// dropped without cancelling.
    pub async fn done(&self) -> Cancellation {
        let mut rx = self.rx.clone();
        let cancelled = async move {
            loop {
                let current = *rx.borrow_and_update();
                if let Some(cause) = current {
                    return cause;
                }
                if rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                cause = cancelled => cause,
                _ = sleep_until(deadline) => Cancellation::DeadlineExceeded,
            },
            None => cancelled.await,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_is_never_done() {
        let ctx = Context::background();
        assert_eq!(ctx.err(), None);

        let result = tokio::time::timeout(Duration::from_millis(20), ctx.done()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cancel_wakes_all_clones() {
        let (ctx, handle) = Context::with_cancel();
        let clone = ctx.clone();

        let waiter = tokio::spawn(async move { clone.done().await });
        tokio::task::yield_now().await;

        handle.cancel();
        handle.cancel();

        assert_eq!(waiter.await.unwrap(), Cancellation::Cancelled);
        assert_eq!(ctx.err(), Some(Cancellation::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let ctx = Context::background().with_timeout(Duration::from_secs(5));
        let start = Instant::now();

        assert_eq!(ctx.done().await, Cancellation::DeadlineExceeded);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(ctx.err(), Some(Cancellation::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_deadline_wins() {
        let ctx = Context::background().with_timeout(Duration::from_secs(2));
        let derived = ctx.with_timeout(Duration::from_secs(60));

        assert_eq!(derived.deadline(), ctx.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_timeout_does_not_panic() {
        let ctx = Context::background().with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline(), None);
        assert_eq!(ctx.err(), None);

        // An existing deadline is kept
        let bounded = Context::background().with_timeout(Duration::from_secs(5));
        let derived = bounded.with_timeout(Duration::MAX);
        assert_eq!(derived.deadline(), bounded.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_deadline_reports_cancelled() {
        let (ctx, handle) = Context::with_cancel();
        let ctx = ctx.with_timeout(Duration::from_secs(30));

        handle.cancel();
        assert_eq!(ctx.done().await, Cancellation::Cancelled);
    }
}
