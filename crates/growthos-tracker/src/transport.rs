use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use thiserror::Error;

/// Browsers refuse beacon payloads above this size.
pub const BEACON_MAX_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("endpoint answered {0}")]
    Status(StatusCode),
}

impl TransportError {
    /// Network failures, throttling and server errors are worth a retry;
    /// other client errors would fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status(status) => *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
        }
    }
}

/// Called with the original body when an accepted beacon fails in flight
/// with a retryable error.
pub type BeaconFallback = Box<dyn FnOnce(String) + Send + 'static>;

/// How payloads leave the page.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fire-and-forget hand-off. `false` means the payload was not accepted
    /// and nothing was sent. Once accepted, a retryable failure hands the
    /// body to `on_failure`.
    fn beacon(&self, endpoint: &str, body: String, on_failure: BeaconFallback) -> bool;

    /// Awaited POST whose outcome is observable.
    async fn post(&self, endpoint: &str, body: String) -> Result<(), TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self { client })
    }

    async fn send(client: &Client, endpoint: &str, body: String) -> Result<(), TransportError> {
        let resp = client
            .post(endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(resp.status()))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    /// Detaches the request onto the current tokio runtime. Refuses when no
    /// runtime is running or the payload is over [`BEACON_MAX_BYTES`].
    fn beacon(&self, endpoint: &str, body: String, on_failure: BeaconFallback) -> bool {
        if body.len() > BEACON_MAX_BYTES {
            return false;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return false;
        };
        let client = self.client.clone();
        let endpoint = endpoint.to_string();
        handle.spawn(async move {
            match Self::send(&client, &endpoint, body.clone()).await {
                Ok(()) => {}
                Err(err) if err.is_retryable() => {
                    tracing::debug!(error = %err, "Beacon delivery failed");
                    on_failure(body);
                }
                Err(err) => tracing::warn!(error = %err, "Beacon rejected by endpoint"),
            }
        });
        true
    }

    async fn post(&self, endpoint: &str, body: String) -> Result<(), TransportError> {
        Self::send(&self.client, endpoint, body).await
    }
}
