//! Request pacing
//!
//! Every pipeline issues its page requests through a `RequestPacer`,
//! which enforces a minimum interval between consecutive requests from
//! that pipeline instance. The delay budget is per-instance: pipelines
//! for different sources do not share one.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum inter-request delay, measured from when the previous request
/// was released by this pacer.
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    last_release: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_release: Mutex::new(None),
        }
    }

    /// Wait until the minimum interval since the previous acquisition has
    /// elapsed. The first acquisition returns immediately. Callers are
    /// serialized, so the spacing holds even under concurrent use.
    pub async fn acquire(&self) {
        let mut last = self.last_release.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let pacer = RequestPacer::new(Duration::from_millis(500));
        let start = Instant::now();
        pacer.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_enforced() {
        let pacer = RequestPacer::new(Duration::from_millis(500));
        let start = Instant::now();
        pacer.acquire().await;
        pacer.acquire().await;
        pacer.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_interval_not_repaid() {
        let pacer = RequestPacer::new(Duration::from_millis(200));
        pacer.acquire().await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        let start = Instant::now();
        pacer.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
