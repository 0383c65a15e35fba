use serde::{Deserialize, Serialize};

use domain::{Event, EventStatus, RecurringEvent};
use shared::{CalendarId, EventId};

use super::date::parse_event_date_time;
use super::error::GoogleCalendarError;

/// Wire shape of a provider date/time value: exactly one of `date_time`
/// (RFC3339) or `date` (`YYYY-MM-DD`, all-day) is set, or neither for a
/// cancelled event that was never materialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEventItem {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    pub status: String,
    #[serde(default)]
    pub start: EventDateTime,
    #[serde(default)]
    pub end: EventDateTime,
    #[serde(default)]
    pub recurrence: Vec<String>,
    #[serde(rename = "recurringEventId")]
    pub recurring_event_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsListResponse {
    #[serde(default)]
    pub items: Vec<RawEventItem>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
    #[serde(rename = "nextSyncToken")]
    pub next_sync_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchResponse {
    #[serde(rename = "resourceId")]
    pub resource_id: String,
    pub expiration: String,
}

fn status_from_wire(status: &str) -> EventStatus {
    match status {
        "cancelled" => EventStatus::Cancelled,
        "tentative" => EventStatus::Tentative,
        _ => EventStatus::Confirmed,
    }
}

/// Implements the classification rule: items with a non-empty recurrence
/// array become a `RecurringEvent`; items with an empty array become an
/// `Event`, copying `recurring_event_id` from the provider's
/// `recurringEventId` when present.
pub fn classify(
    calendar_id: &CalendarId,
    item: RawEventItem,
) -> Result<ClassifiedItem, GoogleCalendarError> {
    let start = parse_event_date_time(&item.start)?;
    let end = parse_event_date_time(&item.end)?;
    let status = status_from_wire(&item.status);

    if item.recurrence.is_empty() {
        Ok(ClassifiedItem::Event(Event {
            calendar_id: calendar_id.clone(),
            id: EventId::new(item.id),
            recurring_event_id: item.recurring_event_id.map(EventId::new),
            summary: item.summary,
            start,
            end,
            status,
        }))
    } else {
        Ok(ClassifiedItem::RecurringEvent(RecurringEvent {
            calendar_id: calendar_id.clone(),
            id: EventId::new(item.id),
            summary: item.summary,
            recurrence: serde_json::to_string(&item.recurrence)
                .map_err(|e| GoogleCalendarError::InvalidDateTime(e.to_string()))?,
            start,
            end,
            status,
        }))
    }
}

pub enum ClassifiedItem {
    Event(Event),
    RecurringEvent(RecurringEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_empty_recurrence_as_event() {
        let item = RawEventItem {
            id: "evt-1".to_string(),
            summary: "standup".to_string(),
            status: "confirmed".to_string(),
            start: EventDateTime::default(),
            end: EventDateTime::default(),
            recurrence: vec![],
            recurring_event_id: None,
        };
        match classify(&CalendarId::new("cal-1"), item).unwrap() {
            ClassifiedItem::Event(_) => (),
            ClassifiedItem::RecurringEvent(_) => panic!("expected Event"),
        }
    }

    #[test]
    fn classifies_non_empty_recurrence_as_master() {
        let item = RawEventItem {
            id: "evt-1".to_string(),
            summary: "standup".to_string(),
            status: "confirmed".to_string(),
            start: EventDateTime::default(),
            end: EventDateTime::default(),
            recurrence: vec!["RRULE:FREQ=DAILY".to_string()],
            recurring_event_id: None,
        };
        match classify(&CalendarId::new("cal-1"), item).unwrap() {
            ClassifiedItem::RecurringEvent(_) => (),
            ClassifiedItem::Event(_) => panic!("expected RecurringEvent"),
        }
    }
}
