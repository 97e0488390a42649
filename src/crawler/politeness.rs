//! Politeness policy: a minimum interval between requests of one worker
//!
//! Each worker owns a lane holding the time of its last request. Before a
//! request the worker computes the time elapsed since then, sleeps the
//! remainder of the interval and records the new timestamp. Lanes are
//! independent, so workers are never serialized against each other.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct Politeness {
    interval: Duration,
    lanes: Vec<Mutex<Option<Instant>>>,
}

impl Politeness {
    /// Creates a policy with `lanes` independent workers
    pub fn new(interval: Duration, lanes: usize) -> Self {
        Self {
            interval,
            lanes: (0..lanes.max(1)).map(|_| Mutex::new(None)).collect(),
        }
    }

    /// Builds the policy from the configured delay in seconds
    pub fn from_secs(delay: f64, lanes: usize) -> Self {
        let interval = Duration::try_from_secs_f64(delay).unwrap_or(Duration::ZERO);
        Self::new(interval, lanes)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn lanes(&self) -> usize {
        self.lanes.len()
    }

    /// Waits until `lane` may issue its next request
    pub async fn wait(&self, lane: usize) {
        if self.interval.is_zero() {
            return;
        }

        let mut last = self.lanes[lane % self.lanes.len()].lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}
