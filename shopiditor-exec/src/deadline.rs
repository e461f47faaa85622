//! Deadline handling for a single execution
//!
//! A [`Deadline`] is created at the instant execution begins and threaded into
//! [`Runtime::execute`](crate::Runtime::execute). Runtimes race their blocking
//! work against it and cancel that work when it fires.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default time a runtime may spend reaping resources after a deadline or exit
pub const DEFAULT_CLEANUP_GRACE: Duration = Duration::from_millis(500);

/// Point in time by which an execution must finish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::after(Duration::from_millis(ms))
    }

    /// The instant the deadline fires
    pub fn at(&self) -> Instant {
        self.started + self.budget
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    pub fn remaining(&self) -> Duration {
        self.at().saturating_duration_since(Instant::now())
    }

    pub fn has_expired(&self) -> bool {
        Instant::now() >= self.at()
    }

    /// Run `fut` until it completes or the deadline fires.
    ///
    /// Returns `None` when the deadline won; `fut` is dropped at that point.
    pub async fn race<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::time::timeout_at(self.at(), fut).await.ok()
    }
}
