//! Client runtime that runs on tenant pages: attribution, delivery with a
//! persisted retry queue, declarative click triggers, SPA navigation and
//! checkout-abandonment detection.

pub mod attribution;
pub mod queue;
pub mod runtime;
pub mod storage;
pub mod transport;
pub mod triggers;

#[cfg(test)]
pub(crate) mod test_support;

pub use runtime::{ScriptConfig, Tracker, TrackerPhase};
pub use storage::{MemoryStorage, Storage, StorageError, UnavailableStorage};
pub use transport::{BeaconFallback, HttpTransport, Transport, TransportError};
