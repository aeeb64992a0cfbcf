//! Per-call cancellation and deadline.
//!
//! Every remote call made by the core runs under a [`CallContext`]. The
//! embedding application builds one per request (usually with a timeout) and
//! can cancel it from outside through its [`CancellationToken`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Cancellation signal plus optional deadline for one logical operation.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Deadline>,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// `None` when `timeout` reaches past what the clock can represent,
    /// which is the same as no deadline.
    fn after(timeout: Duration) -> Option<Self> {
        Instant::now().checked_add(timeout).map(|at| Self {
            at,
            budget: timeout,
        })
    }
}

impl CallContext {
    /// A context that is never cancelled and has no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Deadline::after(timeout),
        }
    }

    /// A context driven by an existing cancellation token.
    #[must_use]
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Add a deadline `timeout` from now, keeping the cancellation token.
    #[must_use]
    pub fn and_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Deadline::after(timeout);
        self
    }

    /// A child context: cancelled with its parent, same deadline.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// The underlying cancellation token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel this context and all of its children.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Time left before the deadline, if one is set.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.at.saturating_duration_since(Instant::now()))
    }

    /// Fail fast when the context is already cancelled or expired.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d.at => Err(Error::DeadlineExceeded(d.budget)),
            _ => Ok(()),
        }
    }

    /// Drive `fut` to completion unless the context ends first.
    ///
    /// When the context wins, `fut` is dropped and its partial work discarded.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;

        let expiry = async {
            match self.deadline {
                Some(d) => {
                    tokio::time::sleep_until(d.at).await;
                    d.budget
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            budget = expiry => Err(Error::DeadlineExceeded(budget)),
            result = fut => result,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_returns_inner_result() {
        let ctx = CallContext::new();
        let value = ctx.run(async { Ok(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_cancelled_context_fails_fast() {
        let ctx = CallContext::new();
        ctx.cancel();
        let result = ctx.run(async { Ok(()) }).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_child_is_cancelled_with_parent() {
        let parent = CallContext::new();
        let child = parent.child();
        parent.cancel();
        assert!(matches!(child.check(), Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_means_no_deadline() {
        let ctx = CallContext::with_timeout(Duration::MAX);
        assert!(ctx.remaining().is_none());
        assert_eq!(ctx.run(async { Ok(7) }).await.unwrap(), 7);

        let ctx = CallContext::new().and_timeout(Duration::from_secs(u64::MAX));
        assert!(ctx.check().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_slow_call() {
        let ctx = CallContext::with_timeout(Duration::from_secs(30));
        let result: Result<()> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;
        assert!(matches!(
            result,
            Err(Error::DeadlineExceeded(d)) if d == Duration::from_secs(30)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_in_flight_call() {
        let ctx = CallContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });
        let result: Result<()> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining() {
        let ctx = CallContext::with_timeout(Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(ctx.remaining(), Some(Duration::from_secs(6)));
        assert_eq!(CallContext::new().remaining(), None);
    }
}
