use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::sanitize::{sanitize_metadata, to_cents, to_int, to_text};

/// Well-known event types the aggregation layer gives meaning to. The
/// vocabulary is open: tenants may send any other string.
pub const PAGEVIEW: &str = "pageview";
pub const SIGNUP: &str = "signup";
pub const PAYMENT: &str = "payment";
pub const CHECKOUT_STARTED: &str = "checkout_started";
pub const CHECKOUT_ABANDONED: &str = "checkout_abandoned";

/// Sanitized business fields of a tracked event.
///
/// Every field is optional; monetary values are integer cents computed from
/// the client's major-unit decimal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFields {
    pub gross_value_in_cents: Option<i64>,
    pub net_value_in_cents: Option<i64>,
    pub discount_in_cents: Option<i64>,
    pub gateway_fee_in_cents: Option<i64>,
    pub installments: Option<i64>,
    pub payment_method: Option<String>,

    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub category: Option<String>,

    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
    pub content: Option<String>,
    pub landing_page: Option<String>,
    pub referrer: Option<String>,

    pub device: Option<String>,
    pub customer_type: Option<String>,
    pub customer_id: Option<String>,
    pub session_id: Option<String>,

    pub metadata: Option<Map<String, Value>>,
}

impl EventFields {
    /// Pull every known field out of an untrusted JSON object, coercing each
    /// one independently.
    pub fn from_json(body: &Map<String, Value>) -> Self {
        Self {
            gross_value_in_cents: to_cents(body.get("gross_value")),
            net_value_in_cents: to_cents(body.get("net_value")),
            discount_in_cents: to_cents(body.get("discount")),
            gateway_fee_in_cents: to_cents(body.get("gateway_fee")),
            installments: to_int(body.get("installments")),
            payment_method: to_text(body.get("payment_method")),

            product_id: to_text(body.get("product_id")),
            product_name: to_text(body.get("product_name")),
            category: to_text(body.get("category")),

            source: to_text(body.get("source")),
            medium: to_text(body.get("medium")),
            campaign: to_text(body.get("campaign")),
            content: to_text(body.get("content")),
            landing_page: to_text(body.get("landing_page")),
            referrer: to_text(body.get("referrer")),

            device: to_text(body.get("device")),
            customer_type: to_text(body.get("customer_type")),
            customer_id: to_text(body.get("customer_id")),
            session_id: to_text(body.get("session_id")),

            metadata: sanitize_metadata(body.get("metadata")),
        }
    }
}

/// A validated `POST /api/track` body.
///
/// `key` is the raw tenant credential; it is never persisted.
#[derive(Debug, Clone)]
pub struct TrackRequest {
    pub key: String,
    pub event_type: String,
    pub fields: EventFields,
}

impl TrackRequest {
    pub fn from_json(body: &Value) -> Result<Self, CoreError> {
        let Value::Object(map) = body else {
            return Err(CoreError::NotAnObject);
        };
        let key = to_text(map.get("key")).ok_or(CoreError::MissingField("key"))?;
        let event_type =
            to_text(map.get("event_type")).ok_or(CoreError::MissingField("event_type"))?;
        Ok(Self {
            key,
            event_type,
            fields: EventFields::from_json(map),
        })
    }
}

/// The stored event: mirrors the DuckDB `events` table columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub organization_id: String,
    pub event_type: String,
    #[serde(flatten)]
    pub fields: EventFields,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Build the row for `organization_id`, which always comes from the
    /// authenticated key and never from the payload.
    pub fn new(organization_id: &str, event_type: String, fields: EventFields) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            event_type,
            fields,
            created_at: Utc::now(),
        }
    }

    /// Serialized metadata for VARCHAR storage.
    pub fn metadata_json(&self) -> Result<Option<String>, CoreError> {
        self.fields
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(CoreError::from)
    }
}
