use std::sync::Arc;

use tracing::debug;

use growthos_core::analytics::AnalyticsBackend;
use growthos_core::config::Config;
use growthos_duckdb::DuckDbBackend;
use growthos_metadata::TenantStore;

use crate::metadata::DuckDbTenantStore;
use crate::rate_limit::{InMemoryRateLimiter, NullRateLimiter, RateLimitStore};

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
pub struct AppState {
    /// Concrete DuckDB handle, kept for the health ping.
    pub db: Arc<DuckDbBackend>,

    /// Event store and aggregation reads.
    pub analytics: Arc<dyn AnalyticsBackend>,

    /// Organizations, API keys and cost records.
    pub tenants: Arc<dyn TenantStore>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    /// Per-key limiter for `POST /api/track`. Never held across a database
    /// call.
    pub rate_limiter: Arc<dyn RateLimitStore>,
}

impl AppState {
    /// Wire the DuckDB backend into every store. The in-memory limiter is
    /// swapped for [`NullRateLimiter`] when `rate_limit_disable` is set.
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        let rate_limiter: Arc<dyn RateLimitStore> = if config.rate_limit_disable {
            Arc::new(NullRateLimiter)
        } else {
            Arc::new(InMemoryRateLimiter::new())
        };
        Self::with_rate_limiter(db, config, rate_limiter)
    }

    pub fn with_rate_limiter(
        db: DuckDbBackend,
        config: Config,
        rate_limiter: Arc<dyn RateLimitStore>,
    ) -> Self {
        let db = Arc::new(db);
        Self {
            analytics: db.clone(),
            tenants: Arc::new(DuckDbTenantStore::new(db.clone())),
            db,
            config: Arc::new(config),
            rate_limiter,
        }
    }

    /// Background loop: drop expired limiter windows once per window period.
    ///
    /// Spawned as a `tokio::spawn` task in `main.rs`; runs until the process
    /// exits.
    pub async fn run_rate_limit_prune_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.rate_limit_window());
        loop {
            ticker.tick().await;
            let removed = self.rate_limiter.prune_expired().await;
            if removed > 0 {
                debug!(removed, "Pruned expired rate-limit windows");
            }
        }
    }
}
