//! Deferred retry scheduling
//!
//! The zone client never sleeps directly; it asks a [`RetryScheduler`] to
//! wait. Production code uses [`TokioScheduler`], tests use
//! [`RecordingScheduler`] so no real time passes.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Waits before a retry
#[allow(async_fn_in_trait)]
pub trait RetryScheduler {
    /// Resolve after `delay` has elapsed.
    async fn wait(&self, delay: Duration);
}

/// Timer-backed scheduler
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl RetryScheduler for TokioScheduler {
    async fn wait(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Virtual-time scheduler that records each requested delay and returns immediately
#[derive(Debug, Clone, Default)]
pub struct RecordingScheduler {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sum of all requested delays
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.delays().iter().sum()
    }
}

impl RetryScheduler for RecordingScheduler {
    async fn wait(&self, delay: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(delay);
        tokio::task::yield_now().await;
    }
}

impl<S: RetryScheduler> RetryScheduler for Arc<S> {
    async fn wait(&self, delay: Duration) {
        self.as_ref().wait(delay).await;
    }
}
