use chrono::{DateTime, Utc};
use shared::CalendarId;
use sqlx::FromRow;

/// Row shape of `sync_histories`. Append-only log; the newest row per
/// calendar defines the current incremental cursor.
#[derive(Debug, Clone, FromRow)]
pub struct SyncHistoryRow {
    pub calendar_id: CalendarId,
    pub sync_time: DateTime<Utc>,
    pub next_sync_token: String,
    pub updated_event_count: i64,
}

/// Row shape of `sync_future_instance_histories`.
#[derive(Debug, Clone, FromRow)]
pub struct SyncFutureInstanceHistoryRow {
    pub calendar_id: CalendarId,
    pub sync_time: DateTime<Utc>,
    pub updated_event_count: i64,
}
