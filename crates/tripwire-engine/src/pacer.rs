//! Fixed-interval pacing of API calls

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Keeps at least `interval` between the end of one call and the start of
/// the next
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    last_call: Option<Instant>,
}

impl Pacer {
    /// A zero interval disables pacing
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: None,
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Sleep until the next call may start
    pub async fn wait(&self) {
        if let Some(last) = self.last_call {
            if !self.interval.is_zero() {
                sleep_until(last + self.interval).await;
            }
        }
    }

    /// Wait for the next slot, run `call`, and mark its completion
    pub async fn call<F, T>(&mut self, call: F) -> T
    where
        F: Future<Output = T>,
    {
        self.wait().await;
        let output = call.await;
        self.last_call = Some(Instant::now());
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate() {
        let mut pacer = Pacer::from_millis(500);
        let start = Instant::now();
        pacer.call(async {}).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_calls_are_spaced() {
        let mut pacer = Pacer::from_millis(200);
        let mut starts = Vec::new();
        for _ in 0..4 {
            pacer.call(async { starts.push(Instant::now()) }).await;
        }

        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(200));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_needs_no_extra_wait_after_interval() {
        let mut pacer = Pacer::from_millis(100);
        pacer.call(async {}).await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        let before = Instant::now();
        pacer.call(async {}).await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_waits() {
        let mut pacer = Pacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..10 {
            pacer.call(async {}).await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
