use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{CalendarId, EventId};

/// Lifecycle state the provider communicates for both events and masters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Confirmed => "confirmed",
            EventStatus::Tentative => "tentative",
            EventStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(EventStatus::Confirmed),
            "tentative" => Ok(EventStatus::Tentative),
            "cancelled" => Ok(EventStatus::Cancelled),
            other => Err(format!("unknown event status: {other}")),
        }
    }
}

/// A non-recurring event, or a single materialized occurrence of a
/// recurring master.
///
/// `(calendar_id, id)` is unique within the store. `start`/`end` are null
/// only for cancelled events that were never fully materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub calendar_id: CalendarId,
    pub id: EventId,
    pub recurring_event_id: Option<EventId>,
    pub summary: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: EventStatus,
}

impl Event {
    /// Field-wise comparison ignoring `calendar_id`/`id`, used to skip
    /// no-op writes during reconciliation.
    pub fn content_eq(&self, other: &Event) -> bool {
        self.recurring_event_id == other.recurring_event_id
            && self.summary == other.summary
            && self.start == other.start
            && self.end == other.end
            && self.status == other.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Event {
        Event {
            calendar_id: CalendarId::new("cal-1"),
            id: EventId::new("evt-1"),
            recurring_event_id: None,
            summary: "standup".to_string(),
            start: None,
            end: None,
            status: EventStatus::Confirmed,
        }
    }

    #[test]
    fn content_eq_ignores_identity_fields() {
        let a = base();
        let mut b = base();
        b.calendar_id = CalendarId::new("cal-2");
        assert!(a.content_eq(&b));
    }

    #[test]
    fn content_eq_detects_status_change() {
        let a = base();
        let mut b = base();
        b.status = EventStatus::Cancelled;
        assert!(!a.content_eq(&b));
    }
}
