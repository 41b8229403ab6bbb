use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Global rate token for one upstream endpoint class.
///
/// Enforces a minimum spacing between calls across every caller that
/// holds a clone. Free-tier APIs rate limit per account, not per
/// component, so the token must be shared, not per-company.
#[derive(Clone)]
pub struct Pacer {
    min_spacing: Duration,
    last_call: Arc<Mutex<Option<Instant>>>,
}

impl Pacer {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last_call: Arc::new(Mutex::new(None)),
        }
    }

    /// A pacer that never waits, for tests and offline mode.
    pub fn unthrottled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Sleep until the minimum spacing since the previous call has
    /// elapsed, then claim the slot. The lock is held across the sleep
    /// so concurrent callers queue rather than stampede.
    pub async fn wait_turn(&self) {
        if self.min_spacing.is_zero() {
            return;
        }
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_spacing {
                let wait = self.min_spacing - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "rate pacing");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unthrottled_never_waits() {
        let pacer = Pacer::unthrottled();
        let start = Instant::now();
        for _ in 0..100 {
            pacer.wait_turn().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn enforces_minimum_spacing() {
        let pacer = Pacer::new(Duration::from_secs(12));
        let start = Instant::now();
        pacer.wait_turn().await;
        pacer.wait_turn().await;
        pacer.wait_turn().await;
        // Two waits of 12s after the first free call.
        assert!(start.elapsed() >= Duration::from_secs(24));
    }

    #[tokio::test(start_paused = true)]
    async fn spacing_is_shared_across_clones() {
        let pacer = Pacer::new(Duration::from_secs(5));
        let other = pacer.clone();
        let start = Instant::now();
        pacer.wait_turn().await;
        other.wait_turn().await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
