use std::time::Duration;
use tokio::time::Instant;

/// Wall-clock stopwatch used to decide when a connection or a periodic
/// action has gone stale.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Timer {
            start: Instant::now(),
        }
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// True once strictly more than `threshold` has elapsed since the last reset.
    pub fn past(&self, threshold: Duration) -> bool {
        self.elapsed() > threshold
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
