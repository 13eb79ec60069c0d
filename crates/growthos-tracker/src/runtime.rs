use std::collections::HashMap;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use url::Url;

use crate::attribution::{self, PageContext};
use crate::queue::DeliveryQueue;
use crate::storage::{read_json, remove_quietly, write_json, Storage};
use crate::transport::Transport;
use crate::triggers::{find_trigger, Element};

pub const CHECKOUT_KEY: &str = "growthos_checkout";

/// Settings read from the embedding `<script>` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptConfig {
    /// `data-key`: the tenant's ingestion key.
    pub key: String,
    /// Origin of the script's `src`; empty when it has none.
    pub api_base: String,
    /// `data-auto-abandon`, on unless set to `"false"`.
    pub auto_abandon: bool,
}

impl ScriptConfig {
    pub fn from_attributes(attrs: &HashMap<String, String>) -> Self {
        let api_base = attrs
            .get("src")
            .and_then(|src| Url::parse(src).ok())
            .map(|url| url.origin())
            .filter(|origin| origin.is_tuple())
            .map(|origin| origin.ascii_serialization())
            .unwrap_or_default();
        Self {
            key: attrs.get("data-key").cloned().unwrap_or_default(),
            api_base,
            auto_abandon: attrs.get("data-auto-abandon").map(String::as_str) != Some("false"),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/track", self.api_base)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    Idle,
    FlushingQueue,
    AutoPageviewFired,
    Listening,
}

/// One tracker per page. Owns its configuration, the page context, both
/// storage scopes and the transport.
pub struct Tracker {
    config: ScriptConfig,
    endpoint: String,
    page: PageContext,
    session: Arc<dyn Storage>,
    queue: DeliveryQueue,
    transport: Arc<dyn Transport>,
    phase: TrackerPhase,
    last_path: String,
}

impl Tracker {
    pub fn new(
        config: ScriptConfig,
        page: PageContext,
        session: Arc<dyn Storage>,
        local: Arc<dyn Storage>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let last_path = page.url.path().to_string();
        Self {
            endpoint: config.endpoint(),
            config,
            page,
            session,
            queue: DeliveryQueue::new(local),
            transport,
            phase: TrackerPhase::Idle,
            last_path,
        }
    }

    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    /// Capture UTMs, retry anything left from earlier pages, record the
    /// initial pageview and start listening.
    pub async fn start(&mut self) {
        if self.phase != TrackerPhase::Idle {
            return;
        }
        attribution::persist_utms(&self.page, self.session.as_ref());

        self.phase = TrackerPhase::FlushingQueue;
        self.flush().await;

        self.track("pageview", Map::new()).await;
        self.phase = TrackerPhase::AutoPageviewFired;

        self.last_path = self.page.url.path().to_string();
        self.phase = TrackerPhase::Listening;
        tracing::debug!(endpoint = %self.endpoint, "Tracker listening");
    }

    pub async fn flush(&self) -> usize {
        self.queue.flush(self.transport.as_ref(), &self.endpoint).await
    }

    /// Attribution, then caller data, then the envelope fields; later keys
    /// win.
    fn payload(&self, event_type: &str, data: &Map<String, Value>, extra: &[(&str, Value)]) -> Value {
        let attribution = attribution::resolve(&self.page, self.session.as_ref());
        let mut payload = match serde_json::to_value(attribution) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        payload.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
        payload.insert("key".to_string(), Value::String(self.config.key.clone()));
        payload.insert("event_type".to_string(), Value::String(event_type.to_string()));
        for (k, v) in extra {
            payload.insert((*k).to_string(), v.clone());
        }
        payload.insert(
            "timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        Value::Object(payload)
    }

    pub async fn track(&self, event_type: &str, data: Map<String, Value>) {
        let payload = self.payload(event_type, &data, &[]);

        match event_type {
            "checkout_started" => write_json(self.session.as_ref(), CHECKOUT_KEY, &data),
            "payment" => remove_quietly(self.session.as_ref(), CHECKOUT_KEY),
            _ => {}
        }

        self.queue
            .deliver(self.transport.as_ref(), &self.endpoint, payload)
            .await;
    }

    /// Click on the element at `path[0]`; `path` continues with its
    /// ancestors. Returns whether a trigger fired.
    pub async fn handle_click(&self, path: &[Element]) -> bool {
        if self.phase != TrackerPhase::Listening {
            return false;
        }
        let Some(trigger) = find_trigger(path) else {
            return false;
        };
        self.track(&trigger.event_type, trigger.data).await;
        true
    }

    pub async fn push_state(&mut self, url: &str) {
        self.navigate(url).await;
    }

    pub async fn replace_state(&mut self, url: &str) {
        self.navigate(url).await;
    }

    pub async fn pop_state(&mut self, url: &str) {
        self.navigate(url).await;
    }

    async fn navigate(&mut self, url: &str) {
        match self.page.url.join(url) {
            Ok(next) => self.page.url = next,
            Err(err) => {
                tracing::debug!(url, error = %err, "Ignoring unparseable navigation target");
                return;
            }
        }
        if self.phase != TrackerPhase::Listening {
            return;
        }
        let path = self.page.url.path().to_string();
        if path != self.last_path {
            self.last_path = path;
            self.track("pageview", Map::new()).await;
        }
    }

    /// Page is going away. A cached checkout becomes a `checkout_abandoned`
    /// beacon with no POST fallback. A refused beacon is dropped; one that
    /// fails in flight is queued for the next page load.
    pub fn handle_unload(&self) -> bool {
        if !self.config.auto_abandon || self.phase != TrackerPhase::Listening {
            return false;
        }
        let Some(checkout) = read_json::<Map<String, Value>>(self.session.as_ref(), CHECKOUT_KEY) else {
            return false;
        };
        let payload = self.payload(
            "checkout_abandoned",
            &checkout,
            &[("reason", Value::String("exit".to_string()))],
        );
        remove_quietly(self.session.as_ref(), CHECKOUT_KEY);
        self.transport
            .beacon(&self.endpoint, payload.to_string(), self.queue.requeue_hook())
    }
}
