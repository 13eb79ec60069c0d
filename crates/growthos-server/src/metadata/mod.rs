pub mod duckdb;

pub use self::duckdb::DuckDbTenantStore;
