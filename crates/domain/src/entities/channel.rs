use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{CalendarId, ResourceId};

/// A provider-side push subscription.
///
/// Never physically deleted; `is_stopped` flips once and the row remains
/// for audit. For any `calendar_id` there is at most one row with
/// `expiration > now && !is_stopped` (the "active" channel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub calendar_id: CalendarId,
    pub resource_id: ResourceId,
    pub start_time: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
    pub is_stopped: bool,
}

impl Channel {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_stopped && self.expiration > now
    }
}
