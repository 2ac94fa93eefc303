//! Request-scoped cancellation and deadlines.
//!
//! Every call that may suspend (limiter waits, provider calls, cache and
//! storage round trips) takes a [`RequestContext`] and must return promptly
//! once it is cancelled or its deadline passes. Cancellation is cooperative:
//! long loops poll [`RequestContext::check`] between steps.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context stopped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// Cancelled explicitly, directly or through a parent.
    #[error("context cancelled")]
    Cancelled,

    /// The deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation token plus an optional deadline.
#[derive(Debug, Clone)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A fresh context that expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A fresh context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Wrap an existing token, e.g. one cancelled on Ctrl-C.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a context that is cancelled with `self` and expires after
    /// `timeout` or at the parent's deadline, whichever comes first.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < own => parent,
            _ => own,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the reason this context is done, if it is.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Cooperative checkpoint.
    pub fn check(&self) -> Result<(), ContextError> {
        match self.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => ContextError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ContextError::Cancelled
            }
        }
    }

    /// Race `fut` against this context. An already-done context fails
    /// without polling `fut`.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ContextError>
    where
        F: Future,
    {
        self.check()?;
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            output = fut => Ok(output),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}
