use chrono::{DateTime, Utc};
use shared::{CalendarId, EventId};
use sqlx::FromRow;

/// Row shape of `recurring_events`. `recurrence` is the opaque JSON-encoded
/// rule/exdate/rdate array; this crate never parses it.
#[derive(Debug, Clone, FromRow)]
pub struct RecurringEventRow {
    pub calendar_id: CalendarId,
    pub id: EventId,
    pub summary: String,
    pub recurrence: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: String,
}
