//! Request pacing
//!
//! A [`PacingGate`] enforces a fixed pause between the end of one request
//! and the start of the next. The first request passes immediately and no
//! pause follows the last one. Each sequential lane (the discovery loop, or
//! one enrichment slot) owns its own gate, so pacing applies per lane rather
//! than globally. A zero interval disables pacing, which tests rely on.

use std::time::Duration;
use tokio::time::Instant;

/// Fixed-interval gate for one sequential lane of requests
#[derive(Debug, Clone)]
pub struct PacingGate {
    interval: Duration,
    last_completed: Option<Instant>,
}

impl PacingGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_completed: None,
        }
    }

    /// A gate that never waits
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How long `wait` would currently block
    pub fn remaining(&self) -> Duration {
        match self.last_completed {
            Some(done) => (done + self.interval).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    /// Waits until the interval since the previous completion has elapsed
    pub async fn wait(&self) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            tracing::trace!("Pacing for {:?}", remaining);
            tokio::time::sleep(remaining).await;
        }
    }

    /// Marks the current request as finished
    pub fn complete(&mut self) {
        self.last_completed = Some(Instant::now());
    }
}
