//! Persisted FIFO of payloads that could not be delivered.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::storage::{read_json, write_json, Storage};
use crate::transport::{BeaconFallback, Transport, TransportError};

pub const QUEUE_KEY: &str = "growthos_queue";
/// Older entries beyond this are dropped silently.
pub const QUEUE_CAP: usize = 50;

fn read_items(storage: &dyn Storage) -> Vec<Value> {
    read_json(storage, QUEUE_KEY).unwrap_or_default()
}

fn write_items(storage: &dyn Storage, items: &[Value]) {
    let start = items.len().saturating_sub(QUEUE_CAP);
    write_json(storage, QUEUE_KEY, &items[start..]);
}

fn push_item(storage: &dyn Storage, payload: Value) {
    let mut items = read_items(storage);
    items.push(payload);
    write_items(storage, &items);
}

fn hold(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct DeliveryQueue {
    storage: Arc<dyn Storage>,
    /// Held for each read-modify-write of the stored list. Beacon failures
    /// append from a runtime task while the page keeps queueing.
    lock: Arc<Mutex<()>>,
}

impl DeliveryQueue {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Current queue contents, oldest first.
    pub fn items(&self) -> Vec<Value> {
        read_items(self.storage.as_ref())
    }

    pub fn enqueue(&self, payload: Value) {
        let _guard = hold(&self.lock);
        push_item(self.storage.as_ref(), payload);
    }

    /// Fallback for an accepted beacon: the body goes to the back of the
    /// queue when the request fails in flight.
    pub fn requeue_hook(&self) -> BeaconFallback {
        let storage = Arc::clone(&self.storage);
        let lock = Arc::clone(&self.lock);
        Box::new(move |body| match serde_json::from_str::<Value>(&body) {
            Ok(payload) => {
                let _guard = hold(&lock);
                push_item(storage.as_ref(), payload);
                tracing::debug!("Beacon failed in flight, queued for retry");
            }
            Err(err) => tracing::warn!(error = %err, "Beacon body is not JSON, dropping"),
        })
    }

    /// Beacon first; an awaited POST only when the beacon refuses the payload.
    async fn send(&self, transport: &dyn Transport, endpoint: &str, payload: &Value) -> Result<(), TransportError> {
        let body = payload.to_string();
        if transport.beacon(endpoint, body.clone(), self.requeue_hook()) {
            return Ok(());
        }
        transport.post(endpoint, body).await
    }

    /// Send `payload`, queueing it when the failure is worth a retry.
    pub async fn deliver(&self, transport: &dyn Transport, endpoint: &str, payload: Value) {
        match self.send(transport, endpoint, &payload).await {
            Ok(()) => {}
            Err(err) if err.is_retryable() => {
                tracing::debug!(error = %err, "Delivery failed, queued for retry");
                self.enqueue(payload);
            }
            Err(err) => tracing::warn!(error = %err, "Payload rejected by endpoint"),
        }
    }

    /// Resend everything queued. The queue is emptied before sending; items
    /// that fail again go back to the front in their original order.
    /// Returns the number handed off.
    pub async fn flush(&self, transport: &dyn Transport, endpoint: &str) -> usize {
        let batch = {
            let _guard = hold(&self.lock);
            let batch = read_items(self.storage.as_ref());
            if !batch.is_empty() {
                write_items(self.storage.as_ref(), &[]);
            }
            batch
        };
        if batch.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        let mut failed = Vec::new();
        for item in batch {
            match self.send(transport, endpoint, &item).await {
                Ok(()) => delivered += 1,
                Err(err) if err.is_retryable() => failed.push(item),
                Err(err) => tracing::warn!(error = %err, "Queued payload rejected, dropping"),
            }
        }

        if !failed.is_empty() {
            let _guard = hold(&self.lock);
            failed.extend(read_items(self.storage.as_ref()));
            write_items(self.storage.as_ref(), &failed);
        }
        tracing::debug!(delivered, requeued = failed.len(), "Queue flushed");
        delivered
    }
}
