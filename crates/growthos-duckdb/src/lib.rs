pub mod analytics_impl;
pub mod backend;
pub mod queries;
pub mod schema;
pub mod tenant;

pub use backend::{generate_id, DuckDbBackend};

/// Re-export the `duckdb` crate so consumers (especially tests) can use
/// `growthos_duckdb::duckdb::params!` without an extra dependency.
pub use duckdb;
