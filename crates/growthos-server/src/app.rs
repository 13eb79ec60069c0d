use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{routes, state::AppState};

/// CORS for the dashboard reads: only the configured origins. Entries that
/// are not valid header values are skipped with a warning.
fn dashboard_cors(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// - `/api/track` is embedded on third-party sites: every response, errors
///   included, carries open CORS headers.
/// - `/api/organizations/...` reads sit behind a `CorsLayer` limited to
///   `GROWTHOS_CORS_ORIGINS`.
/// - `TraceLayer` wraps everything.
pub fn build_app(state: Arc<AppState>) -> Router {
    let track = Router::new()
        .route(
            "/api/track",
            post(routes::track::track).options(routes::track::track_preflight),
        )
        .layer(middleware::map_response(routes::track::open_cors_headers));

    let org = "/api/organizations/{org_id}";
    let dashboard = Router::new()
        .route(
            &format!("{org}/funnel"),
            get(routes::dashboard::get_funnel).put(routes::dashboard::put_funnel),
        )
        .route(&format!("{org}/channels"), get(routes::dashboard::get_channels))
        .route(
            &format!("{org}/landing-pages"),
            get(routes::dashboard::get_landing_pages),
        )
        .route(&format!("{org}/categories"), get(routes::dashboard::get_categories))
        .route(&format!("{org}/daily"), get(routes::dashboard::get_daily))
        .route(&format!("{org}/financial"), get(routes::dashboard::get_financial))
        .route(
            &format!("{org}/profit-and-loss"),
            get(routes::dashboard::get_profit_and_loss),
        )
        .route(
            &format!("{org}/costs/{{kind}}"),
            get(routes::dashboard::list_costs).post(routes::dashboard::create_cost),
        )
        .route(
            &format!("{org}/costs/{{kind}}/{{cost_id}}"),
            put(routes::dashboard::update_cost).delete(routes::dashboard::delete_cost),
        )
        .route(
            &format!("{org}/events/recent"),
            get(routes::dashboard::get_recent_events),
        )
        .layer(dashboard_cors(&state.config.cors_origins));

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(track)
        .merge(dashboard)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
