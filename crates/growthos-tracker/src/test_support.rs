use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::transport::{BeaconFallback, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Beacon,
    Post,
}

/// Transport that records delivered payloads and fails on demand.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub refuse_beacon: AtomicBool,
    /// Accept beacons, then report them lost in flight.
    pub drop_beacons: AtomicBool,
    pub fail_post: AtomicBool,
    pub sent: Mutex<Vec<(Channel, Value)>>,
}

impl RecordingTransport {
    pub fn offline() -> Self {
        let t = Self::default();
        t.set_offline(true);
        t
    }

    pub fn set_offline(&self, offline: bool) {
        self.refuse_beacon.store(offline, Ordering::SeqCst);
        self.fail_post.store(offline, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(Channel, Value)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|(_, v)| v["event_type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn record(&self, channel: Channel, body: &str) {
        let value = serde_json::from_str(body).unwrap();
        self.sent.lock().unwrap().push((channel, value));
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn beacon(&self, _endpoint: &str, body: String, on_failure: BeaconFallback) -> bool {
        if self.refuse_beacon.load(Ordering::SeqCst) {
            return false;
        }
        if self.drop_beacons.load(Ordering::SeqCst) {
            on_failure(body);
            return true;
        }
        self.record(Channel::Beacon, &body);
        true
    }

    async fn post(&self, _endpoint: &str, body: String) -> Result<(), TransportError> {
        if self.fail_post.load(Ordering::SeqCst) {
            return Err(TransportError::Status(StatusCode::SERVICE_UNAVAILABLE));
        }
        self.record(Channel::Post, &body);
        Ok(())
    }
}
