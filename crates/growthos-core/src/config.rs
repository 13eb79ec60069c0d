use std::time::Duration;

/// Requests allowed per key inside one rate-limit window.
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 1000;
/// Length of one fixed rate-limit window.
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    /// DuckDB size string such as `"1GB"` or `"512MB"`.
    pub duckdb_memory_limit: String,
    /// Origins allowed to call the dashboard read routes. The track endpoint
    /// is always open to any origin.
    pub cors_origins: Vec<String>,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_disable: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            data_dir: "./data".to_string(),
            duckdb_memory_limit: "1GB".to_string(),
            cors_origins: Vec::new(),
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
            rate_limit_window_secs: DEFAULT_RATE_LIMIT_WINDOW_SECS,
            rate_limit_disable: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("GROWTHOS_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("GROWTHOS_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            duckdb_memory_limit: std::env::var("GROWTHOS_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            cors_origins: std::env::var("GROWTHOS_CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            rate_limit_max: std::env::var("GROWTHOS_RATE_LIMIT_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_RATE_LIMIT_MAX),
            rate_limit_window_secs: std::env::var("GROWTHOS_RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            rate_limit_disable: std::env::var("GROWTHOS_RATE_LIMIT_DISABLE")
                .map(|v| v == "true")
                .unwrap_or(false),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}
