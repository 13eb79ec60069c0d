use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use chrono::Utc;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::Value;
use tracing::{debug, warn};

use growthos_core::event::{Event, TrackRequest};

use crate::{auth::api_keys::hash_api_key, error::AppError, state::AppState};

/// Maximum accepted `POST /api/track` body, in bytes.
pub const MAX_TRACK_BODY_BYTES: usize = 64 * 1024;

/// `POST /api/track`: authenticate, sanitize and persist one event.
///
/// Order of checks: declared size, streamed size, JSON shape, re-serialized
/// size, required fields, rate limit (keyed by the raw key, before any
/// lookup), key lookup. Success is `204` with no body.
#[tracing::instrument(skip(state, headers, body))]
pub async fn track(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, AppError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    if declared.is_some_and(|len| len > MAX_TRACK_BODY_BYTES as u64) {
        return Err(AppError::PayloadTooLarge);
    }

    let bytes = match Limited::new(body, MAX_TRACK_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return Err(AppError::PayloadTooLarge);
        }
        Err(e) => {
            debug!(error = %e, "Failed to read track body");
            return Err(AppError::bad_request("Could not read request body"));
        }
    };

    let payload: Value =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;
    let reserialized = serde_json::to_vec(&payload).map_err(anyhow::Error::from)?;
    if reserialized.len() > MAX_TRACK_BODY_BYTES {
        return Err(AppError::PayloadTooLarge);
    }

    let request = TrackRequest::from_json(&payload)?;

    let allowed = state
        .rate_limiter
        .increment(
            &request.key,
            state.config.rate_limit_window(),
            state.config.rate_limit_max,
        )
        .await;
    if !allowed {
        return Err(AppError::RateLimited);
    }

    let key = state
        .tenants
        .lookup_api_key(&hash_api_key(&request.key))
        .await?
        .filter(|k| k.is_usable(Utc::now()))
        .ok_or(AppError::Unauthorized)?;

    let event = Event::new(&key.organization_id, request.event_type, request.fields);
    state.analytics.insert_event(&event).await?;
    debug!(
        organization_id = %event.organization_id,
        event_type = %event.event_type,
        "Event stored"
    );

    // Best effort; the response never waits on it.
    let tenants = Arc::clone(&state.tenants);
    let key_id = key.id;
    tokio::spawn(async move {
        if let Err(e) = tenants.touch_api_key(&key_id).await {
            warn!(key_id = %key_id, error = %e, "Failed to update api key last_used_at");
        }
    });

    Ok(StatusCode::NO_CONTENT)
}

/// `OPTIONS /api/track`: CORS preflight.
pub async fn track_preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Attach the open CORS headers to every track response, errors included.
pub async fn open_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}
