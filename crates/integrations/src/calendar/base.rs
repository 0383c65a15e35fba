use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use domain::{CalendarClientError, CalendarClientResult, EventPage};
use shared::{CalendarId, EventId};

use super::error::{is_sync_token_stale, GoogleCalendarError};
use super::models::{EventsListResponse, WatchRequest, WatchResponse};
use super::pagination::to_event_page;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";
/// Per-call deadline. The shared `reqwest::Client` is built bare
/// (`Client::new()`); each request sets its own timeout rather than the
/// client carrying a blanket one.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub enum ListCursor<'a> {
    Since(DateTime<Utc>),
    Token(&'a str),
}

pub async fn list_events_page(
    client: &Client,
    access_token: &str,
    calendar_id: &CalendarId,
    cursor: &ListCursor<'_>,
    page_token: Option<&str>,
) -> CalendarClientResult<EventPage> {
    let url = format!(
        "{}/calendars/{}/events",
        API_BASE,
        urlencode(calendar_id.as_str())
    );

    let mut query = vec![
        ("showDeleted", "true".to_string()),
        ("singleEvents", "false".to_string()),
    ];
    match cursor {
        ListCursor::Since(after) => query.push(("timeMin", after.to_rfc3339())),
        ListCursor::Token(token) => query.push(("syncToken", token.to_string())),
    }
    if let Some(token) = page_token {
        query.push(("pageToken", token.to_string()));
    }

    let response = client
        .get(&url)
        .bearer_auth(access_token)
        .query(&query)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(GoogleCalendarError::from)
        .map_err(map_err)?;

    let status = response.status();
    let body = response.text().await.map_err(GoogleCalendarError::from).map_err(map_err)?;

    if status == StatusCode::GONE || (matches!(cursor, ListCursor::Token(_)) && is_sync_token_stale(status, &body)) {
        return Err(CalendarClientError::SyncTokenStale);
    }
    if !status.is_success() {
        return Err(map_err(GoogleCalendarError::Api(format!(
            "HTTP {status}: {body}"
        ))));
    }

    let parsed: EventsListResponse =
        serde_json::from_str(&body).map_err(|e| map_err(GoogleCalendarError::InvalidDateTime(e.to_string())))?;
    to_event_page(calendar_id, parsed)
}

pub async fn list_instances_page(
    client: &Client,
    access_token: &str,
    calendar_id: &CalendarId,
    recurring_event_id: &EventId,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    page_token: Option<&str>,
) -> CalendarClientResult<EventPage> {
    let url = format!(
        "{}/calendars/{}/events/{}/instances",
        API_BASE,
        urlencode(calendar_id.as_str()),
        urlencode(recurring_event_id.as_str())
    );

    let mut query = vec![
        ("showDeleted", "false".to_string()),
        ("timeMin", from.to_rfc3339()),
        ("timeMax", to.to_rfc3339()),
    ];
    if let Some(token) = page_token {
        query.push(("pageToken", token.to_string()));
    }

    let response = client
        .get(&url)
        .bearer_auth(access_token)
        .query(&query)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(GoogleCalendarError::from)
        .map_err(map_err)?;

    let status = response.status();
    let body = response.text().await.map_err(GoogleCalendarError::from).map_err(map_err)?;
    if !status.is_success() {
        return Err(map_err(GoogleCalendarError::Api(format!(
            "HTTP {status}: {body}"
        ))));
    }

    let parsed: EventsListResponse =
        serde_json::from_str(&body).map_err(|e| map_err(GoogleCalendarError::InvalidDateTime(e.to_string())))?;

    // Instance listing never carries a sync token; absence of both tokens
    // on the final page is expected here, not a contract violation.
    let mut page = to_event_page(calendar_id, parsed)?;
    if page.next_page_token.is_none() {
        page.next_sync_token = Some(String::new());
    }
    Ok(page)
}

pub async fn watch(
    client: &Client,
    access_token: &str,
    calendar_id: &CalendarId,
    channel_id: &str,
    webhook_base_url: &str,
) -> CalendarClientResult<WatchResponse> {
    let url = format!(
        "{}/calendars/{}/events/watch",
        API_BASE,
        urlencode(calendar_id.as_str())
    );
    let body = WatchRequest {
        id: channel_id.to_string(),
        kind: "web_hook".to_string(),
        address: format!("{}/{}/", webhook_base_url.trim_end_matches('/'), calendar_id.as_str()),
    };

    let response = client
        .post(&url)
        .bearer_auth(access_token)
        .json(&body)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(GoogleCalendarError::from)
        .map_err(map_err)?;

    let status = response.status();
    let text = response.text().await.map_err(GoogleCalendarError::from).map_err(map_err)?;
    if !status.is_success() {
        return Err(map_err(GoogleCalendarError::Api(format!(
            "HTTP {status}: {text}"
        ))));
    }
    serde_json::from_str(&text).map_err(|e| map_err(GoogleCalendarError::InvalidDateTime(e.to_string())))
}

pub async fn stop_watch(
    client: &Client,
    access_token: &str,
    channel_id: &str,
    resource_id: &str,
) -> CalendarClientResult<()> {
    let url = format!("{API_BASE}/channels/stop");
    let body = serde_json::json!({ "id": channel_id, "resourceId": resource_id });

    let response = client
        .post(&url)
        .bearer_auth(access_token)
        .json(&body)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(GoogleCalendarError::from)
        .map_err(map_err)?;

    let status = response.status();
    if !status.is_success() && status != StatusCode::NOT_FOUND {
        let text = response.text().await.unwrap_or_default();
        return Err(map_err(GoogleCalendarError::Api(format!(
            "HTTP {status}: {text}"
        ))));
    }
    Ok(())
}

fn map_err(err: GoogleCalendarError) -> CalendarClientError {
    CalendarClientError::Request(err.to_string())
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
