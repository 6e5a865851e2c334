//! Minimum-interval gate shared by every call through one dispatcher

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Spaces call issuance at least `min_interval` apart
///
/// The lock is held while sleeping, so concurrent callers queue up and are
/// released one interval apart in the order they arrived.
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_dispatch: Mutex::new(None),
        }
    }

    /// A gate for `requests_per_minute` calls per minute (interval = 60 / rpm seconds)
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1);
        Self::new(Duration::from_secs_f64(60.0 / f64::from(rpm)))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the next call may be issued, then records its issuance
    pub async fn wait_turn(&self) {
        let mut last = self.last_dispatch.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_rpm() {
        assert_eq!(RateGate::per_minute(5).min_interval(), Duration::from_secs(12));
        assert_eq!(RateGate::per_minute(60).min_interval(), Duration::from_secs(1));
        assert_eq!(RateGate::per_minute(0).min_interval(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_turn_is_immediate() {
        let gate = RateGate::per_minute(5);
        let start = Instant::now();
        gate.wait_turn().await;
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_turns_span_two_intervals() {
        let gate = RateGate::per_minute(5);
        let start = Instant::now();
        gate.wait_turn().await;
        gate.wait_turn().await;
        gate.wait_turn().await;
        assert!(start.elapsed() >= Duration::from_secs(24));
        assert!(start.elapsed() < Duration::from_secs(25));
    }
}
