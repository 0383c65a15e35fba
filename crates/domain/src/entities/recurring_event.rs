use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{CalendarId, EventId};

use super::event::{Event, EventStatus};

/// The rule-bearing parent event whose expansion produces concrete
/// instances.
///
/// `(calendar_id, id)` is unique and disjoint from any `Event.id` within the
/// same calendar, unless it is the cancelled twin created when an event's
/// type changes (see `new_cancelled_master_from_event`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringEvent {
    pub calendar_id: CalendarId,
    pub id: EventId,
    pub summary: String,
    /// JSON-encoded array of RFC-5545 rule/exdate/rdate strings, opaque to
    /// this crate.
    pub recurrence: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: EventStatus,
}

impl RecurringEvent {
    pub fn content_eq(&self, other: &RecurringEvent) -> bool {
        self.summary == other.summary
            && self.recurrence == other.recurrence
            && self.start == other.start
            && self.end == other.end
            && self.status == other.status
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == EventStatus::Cancelled
    }

    /// Builds the cancelled "twin" master created when a one-off event
    /// transitions to (or away from) recurring, preserving the shared
    /// `EventID` but carrying no further detail than what the event itself
    /// offered.
    pub fn new_cancelled_master_from_event(event: &Event, recurrence: String) -> Self {
        Self {
            calendar_id: event.calendar_id.clone(),
            id: event.id.clone(),
            summary: event.summary.clone(),
            recurrence,
            start: event.start,
            end: event.end,
            status: EventStatus::Cancelled,
        }
    }
}
