use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::CalendarId;

/// Record of one incremental/full sync run. The newest row per calendar
/// defines the current incremental cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncHistory {
    pub calendar_id: CalendarId,
    pub sync_time: DateTime<Utc>,
    pub next_sync_token: String,
    pub updated_event_count: i64,
}

/// Record of one horizon-extension run (§4.3.4). No sync token is
/// associated with this operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFutureInstanceHistory {
    pub calendar_id: CalendarId,
    pub sync_time: DateTime<Utc>,
    pub updated_event_count: i64,
}
