use axum::{extract::State, Json};
use domain::NewCalendar;
use serde::{Deserialize, Serialize};
use shared::{CalendarId, DomainError};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateCalendarRequest {
    pub calendar_id: String,
    pub name: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub calendar_id: String,
    pub name: String,
}

/// POST /calendars
pub async fn create_calendar(
    State(state): State<AppState>,
    Json(body): Json<CreateCalendarRequest>,
) -> ApiResult<Json<CalendarResponse>> {
    if state.oauth_mode && body.refresh_token.as_deref().map_or(true, str::is_empty) {
        return Err(ApiError::from(DomainError::Required("refreshToken".to_string())));
    }
    if !state.oauth_mode && body.refresh_token.is_some() {
        return Err(ApiError::from(DomainError::NotAllowed("refreshToken".to_string())));
    }

    let calendar = state
        .store
        .with_transaction(move |mut tx| {
            let new_calendar = NewCalendar {
                id: CalendarId::new(body.calendar_id.clone()),
                name: body.name.clone(),
                refresh_token: body.refresh_token.clone(),
            };
            Box::pin(async move { tx.create_calendar(new_calendar).await })
        })
        .await?;

    Ok(Json(CalendarResponse {
        calendar_id: calendar.id.into_string(),
        name: calendar.name,
    }))
}
