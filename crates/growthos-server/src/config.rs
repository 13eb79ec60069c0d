/// Re-export `Config` from `growthos-core` for use within this crate.
///
/// Environment parsing lives in `growthos-core` so integration tests can
/// build a config without the server binary.
pub use growthos_core::config::Config;
