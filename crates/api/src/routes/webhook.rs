use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use shared::CalendarId;

use crate::{metrics, state::AppState};

const RESOURCE_STATE_HEADER: &str = "x-goog-resource-state";
const CHANNEL_ID_HEADER: &str = "x-goog-channel-id";

/// POST /webhooks/calendar - Google Calendar push notification endpoint.
///
/// `ChannelId` is `base64(calendar_id)` (§4.4), so the inbound channel id
/// decodes straight back to the calendar to sync; no lookup table needed.
/// Skips invocation unless `resourceState=exists`.
pub async fn push_notification(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let resource_state = headers
        .get(RESOURCE_STATE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if resource_state != "exists" {
        metrics::record_webhook_delivery(resource_state, false);
        return StatusCode::OK;
    }

    let Some(channel_id) = headers.get(CHANNEL_ID_HEADER).and_then(|v| v.to_str().ok()) else {
        metrics::record_webhook_delivery(resource_state, false);
        return StatusCode::BAD_REQUEST;
    };

    let Some(calendar_id) = calendar_id_from_channel_id(channel_id) else {
        metrics::record_webhook_delivery(resource_state, false);
        return StatusCode::BAD_REQUEST;
    };

    metrics::record_webhook_delivery(resource_state, true);

    match state.sync_engine.sync(&calendar_id).await {
        Ok(outcome) => {
            metrics::record_sync(calendar_id.as_str(), outcome.updated_event_count);
            StatusCode::OK
        }
        Err(e) => {
            metrics::record_sync_failed(calendar_id.as_str());
            tracing::error!(calendar_id = %calendar_id, error = %e, "webhook-triggered sync failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn calendar_id_from_channel_id(channel_id: &str) -> Option<CalendarId> {
    let decoded = STANDARD_NO_PAD.decode(channel_id).ok()?;
    let calendar_id = String::from_utf8(decoded).ok()?;
    Some(CalendarId::new(calendar_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_channel_id_back_to_calendar_id() {
        let channel_id = domain::derive_channel_id(&CalendarId::new("primary"));
        assert_eq!(
            calendar_id_from_channel_id(channel_id.as_str()),
            Some(CalendarId::new("primary"))
        );
    }

    #[test]
    fn rejects_malformed_channel_id() {
        assert_eq!(calendar_id_from_channel_id("not base64!!"), None);
    }
}
