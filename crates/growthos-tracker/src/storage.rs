use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is unavailable")]
    Unavailable,

    #[error("storage lock poisoned")]
    Poisoned,

    #[error("stored value is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Key/value store with the semantics of browser web storage. Session- and
/// local-scoped stores are separate handles of this trait.
///
/// Every call may fail (privacy modes, quota); callers decide how to degrade.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.remove(key);
        Ok(())
    }
}

/// Storage that refuses every operation, as in a browser with storage
/// disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStorage;

impl Storage for UnavailableStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }

    fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }
}

/// Read and parse a JSON value. Missing keys, storage failures and corrupt
/// values all read as `None`.
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(storage: &dyn Storage, key: &str) -> Option<T> {
    let parsed = storage
        .get_item(key)
        .and_then(|raw| raw.map(|r| serde_json::from_str(&r)).transpose().map_err(StorageError::from));
    match parsed {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(key, error = %err, "Ignoring unreadable storage entry");
            None
        }
    }
}

/// Serialize and write a JSON value; failures are logged and dropped.
pub(crate) fn write_json<T: serde::Serialize + ?Sized>(storage: &dyn Storage, key: &str, value: &T) {
    let result = serde_json::to_string(value)
        .map_err(StorageError::from)
        .and_then(|raw| storage.set_item(key, &raw));
    if let Err(err) = result {
        tracing::debug!(key, error = %err, "Storage write skipped");
    }
}

pub(crate) fn remove_quietly(storage: &dyn Storage, key: &str) {
    if let Err(err) = storage.remove_item(key) {
        tracing::debug!(key, error = %err, "Storage remove skipped");
    }
}
