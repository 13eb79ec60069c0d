pub mod analytics;
pub mod config;
pub mod date_range;
pub mod error;
pub mod event;
pub mod funnel;
pub mod pnl;
pub mod sanitize;
