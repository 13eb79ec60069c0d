use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::RateLimitStore;

struct Window {
    count: u32,
    reset_at: Instant,
}

/// Per-process fixed-window limiter.
///
/// All windows sit behind one `tokio::sync::Mutex`; each `increment` reads
/// and updates its key under that lock, so concurrent requests for the same
/// key never lose a count.
#[derive(Default)]
pub struct InMemoryRateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimiter {
    async fn increment(&self, key: &str, window: Duration, max: u32) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if let Some(w) = windows.get_mut(key) {
            if now < w.reset_at {
                w.count = w.count.saturating_add(1);
                return w.count <= max;
            }
        }

        // First request ever, or first at/after the reset instant.
        windows.insert(
            key.to_string(),
            Window {
                count: 1,
                reset_at: now + window,
            },
        );
        max >= 1
    }

    async fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| now < w.reset_at);
        before - windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn thousandth_allowed_then_blocked_until_reset() {
        let limiter = InMemoryRateLimiter::new();
        for i in 1..=1000 {
            assert!(limiter.increment("tok_a", WINDOW, 1000).await, "request {i}");
        }
        assert!(!limiter.increment("tok_a", WINDOW, 1000).await);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!limiter.increment("tok_a", WINDOW, 1000).await);

        // Exactly at the reset instant a fresh window starts.
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.increment("tok_a", WINDOW, 1000).await);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_counted_independently() {
        let limiter = InMemoryRateLimiter::new();
        assert!(limiter.increment("tok_a", WINDOW, 1).await);
        assert!(!limiter.increment("tok_a", WINDOW, 1).await);
        assert!(limiter.increment("tok_b", WINDOW, 1).await);
    }

    #[tokio::test(start_paused = true)]
    async fn prune_drops_only_expired_windows() {
        let limiter = InMemoryRateLimiter::new();
        limiter.increment("old", WINDOW, 10).await;
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.increment("fresh", WINDOW, 10).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(limiter.prune_expired().await, 1);
        assert_eq!(limiter.tracked_keys().await, 1);
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let limiter = std::sync::Arc::new(InMemoryRateLimiter::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.increment("tok_c", WINDOW, 40).await
            }));
        }
        let mut allowed = 0;
        for h in handles {
            if h.await.expect("join") {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 40);
    }
}
