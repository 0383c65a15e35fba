pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use metrics::init_metrics;
pub use state::AppState;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::any::Any as StdAny;
use std::time::Duration;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Per-request deadline (§5's "request-scoped ... timeout"); on expiry
/// `TimeoutLayer` answers 408 itself without the handler's task continuing.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns a caught handler panic into the same JSON error envelope
/// `ApiError` produces, instead of an empty connection reset.
fn handle_panic(err: Box<dyn StdAny + Send + 'static>) -> Response {
    let message = err
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| err.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "request handler panicked".to_string());

    tracing::error!(panic = %message, "panic caught at service boundary");

    let body = json!({
        "error": {
            "code": "internal_error",
            "message": "internal server error",
        }
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Create the application router
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::prometheus::metrics))
        .route("/calendars", post(routes::calendars::create_calendar))
        .route("/calendars/:calendar_id/sync", post(routes::sync::sync))
        .route(
            "/calendars/sync-future-instance-all",
            post(routes::sync::sync_future_instance_all),
        )
        .route(
            "/calendars/:calendar_id/watch/start",
            post(routes::watch::watch_start),
        )
        .route(
            "/calendars/:calendar_id/watch/stop",
            post(routes::watch::watch_stop),
        )
        .route(
            "/calendars/watch/start-all",
            post(routes::watch::watch_start_all),
        )
        .route("/webhooks/calendar", post(routes::webhook::push_notification))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
        .with_state(state)
}
