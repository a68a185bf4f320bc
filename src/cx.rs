//! Cooperative cancellation for long-running cache traversals.
//!
//! Mirrors a Go-style `context.Context`: a cancellation signal plus an
//! optional deadline, cheaply cloneable, checked at loop heads rather than
//! threaded through every call via `?`.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A cancellation/deadline carrier passed to every traversal in this crate.
#[derive(Clone)]
pub struct Cx {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for Cx {
    fn default() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }
}

impl Cx {
    /// A context that never cancels on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that is considered cancelled once `duration` has elapsed.
    pub fn with_deadline(duration: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + duration),
        }
    }

    /// A handle that can cancel this context (and anything derived from it).
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.token.clone())
    }

    /// True once cancelled explicitly or past the deadline, if any.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || matches!(self.deadline, Some(d) if Instant::now() >= d)
    }
}

/// A detached handle that can cancel the [`Cx`] it was derived from.
#[derive(Clone)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.cancel();
    }
}
