use chrono::{DateTime, Utc};
use shared::{CalendarId, ResourceId};
use sqlx::FromRow;

/// Row shape of `channel_histories`. Append-only: rows are never deleted,
/// `is_stopped` flips at most once.
#[derive(Debug, Clone, FromRow)]
pub struct ChannelRow {
    pub calendar_id: CalendarId,
    pub resource_id: ResourceId,
    pub start_time: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
    pub is_stopped: bool,
}
