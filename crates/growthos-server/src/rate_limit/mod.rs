use std::time::Duration;

use async_trait::async_trait;

pub mod memory;

pub use memory::InMemoryRateLimiter;

/// Fixed-window request counter used by `POST /api/track`.
///
/// Stored as `Arc<dyn RateLimitStore>` in [`crate::state::AppState`] so a
/// shared (multi-instance) store can replace the in-process one without
/// touching the handler.
#[async_trait]
pub trait RateLimitStore: Send + Sync + 'static {
    /// Count one request for `key`. Returns `true` while the window's count
    /// is at most `max`.
    async fn increment(&self, key: &str, window: Duration, max: u32) -> bool;

    /// Drop windows whose reset instant has passed. Returns how many were
    /// removed.
    async fn prune_expired(&self) -> usize {
        0
    }
}

/// [`RateLimitStore`] that allows every request.
///
/// Installed when `GROWTHOS_RATE_LIMIT_DISABLE=true`.
pub struct NullRateLimiter;

#[async_trait]
impl RateLimitStore for NullRateLimiter {
    async fn increment(&self, _key: &str, _window: Duration, _max: u32) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_limiter_always_allows() {
        let limiter = NullRateLimiter;
        for _ in 0..5 {
            assert!(limiter.increment("tok_any", Duration::from_secs(60), 1).await);
        }
        assert_eq!(limiter.prune_expired().await, 0);
    }
}
