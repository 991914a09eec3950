//! Timer abstraction driving the poll loop.
//!
//! The poller never touches the clock directly; it asks a [`Scheduler`] to
//! wait. Production code uses [`TokioScheduler`]. Tests inject a scheduler that
//! records requested delays and returns immediately, so backoff and
//! cancellation are checked without real waits.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Suspend the caller for `delay`.
    async fn wait(&self, delay: Duration);
}

/// Wall-clock scheduler backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn wait(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Scheduler that returns immediately and remembers every requested delay.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// All delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn wait(&self, delay: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(delay);
        }
        tokio::task::yield_now().await;
    }
}
