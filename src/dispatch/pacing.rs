//! Injectable delays for the reveal protocol.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Source of the fixed pacing delays.
pub trait Pacer: Send + Sync + 'static {
    fn pause(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

/// Wall-clock pacing on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Pacer that returns immediately and records every requested pause.
#[derive(Debug, Clone, Default)]
pub struct RecordingPacer {
    pauses: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pauses requested so far, in order.
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Pacer for RecordingPacer {
    async fn pause(&self, duration: Duration) {
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        tokio::task::yield_now().await;
    }
}
