use chrono::{DateTime, Utc};
use shared::{CalendarId, EventId};
use sqlx::FromRow;

/// Row shape of `events`. `status` is stored as plain text (`confirmed` /
/// `tentative` / `cancelled`) rather than a Postgres enum so this crate
/// doesn't need a migration every time the provider adds a status value;
/// parsing into `domain::EventStatus` happens in the repository.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub calendar_id: CalendarId,
    pub id: EventId,
    pub recurring_event_id: Option<EventId>,
    pub summary: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: String,
}
