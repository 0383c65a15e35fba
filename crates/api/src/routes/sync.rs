use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use shared::CalendarId;

use crate::{error::ApiResult, metrics, state::AppState};

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub next_sync_token: String,
    pub updated_event_count: u64,
}

/// POST /calendars/:calendar_id/sync
pub async fn sync(
    State(state): State<AppState>,
    Path(calendar_id): Path<String>,
) -> ApiResult<Json<SyncResponse>> {
    let calendar_id = CalendarId::new(calendar_id);
    let outcome = match state.sync_engine.sync(&calendar_id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            metrics::record_sync_failed(calendar_id.as_str());
            return Err(e.into());
        }
    };
    metrics::record_sync(calendar_id.as_str(), outcome.updated_event_count);

    Ok(Json(SyncResponse {
        next_sync_token: outcome.next_sync_token,
        updated_event_count: outcome.updated_event_count,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SyncFutureInstanceAllQuery {
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
pub struct SyncFutureInstanceAllResponse {
    pub updated_event_count: u64,
}

/// POST /calendars/sync-future-instance-all?all=true
pub async fn sync_future_instance_all(
    State(state): State<AppState>,
    Query(query): Query<SyncFutureInstanceAllQuery>,
) -> ApiResult<Json<SyncFutureInstanceAllResponse>> {
    if !query.all {
        return Err(shared::DomainError::AllParameterFalse.into());
    }

    let updated_event_count = state.sync_engine.sync_future_instance_all().await?;
    metrics::record_sync_future_instance_all(updated_event_count);

    Ok(Json(SyncFutureInstanceAllResponse { updated_event_count }))
}
