use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use shared::CalendarId;

use crate::{error::ApiResult, metrics, state::AppState};

/// POST /calendars/:calendar_id/watch/start
pub async fn watch_start(
    State(state): State<AppState>,
    Path(calendar_id): Path<String>,
) -> ApiResult<StatusCode> {
    let calendar_id = CalendarId::new(calendar_id);
    state.watch_manager.start(&calendar_id).await?;
    metrics::record_watch_start(calendar_id.as_str());
    Ok(StatusCode::NO_CONTENT)
}

/// POST /calendars/:calendar_id/watch/stop
pub async fn watch_stop(
    State(state): State<AppState>,
    Path(calendar_id): Path<String>,
) -> ApiResult<StatusCode> {
    let calendar_id = CalendarId::new(calendar_id);
    state.watch_manager.stop(&calendar_id).await?;
    metrics::record_watch_stop(calendar_id.as_str());
    Ok(StatusCode::NO_CONTENT)
}

/// POST /calendars/watch/start-all
pub async fn watch_start_all(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.watch_manager.start_all().await?;
    Ok(StatusCode::NO_CONTENT)
}
