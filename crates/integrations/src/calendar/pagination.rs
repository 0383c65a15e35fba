use domain::{CalendarClientError, CalendarClientResult, EventPage};
use shared::CalendarId;

use super::error::GoogleCalendarError;
use super::models::{classify, ClassifiedItem, EventsListResponse};

/// Converts one raw provider page into the domain-level `EventPage`,
/// applying the classification rule to every item.
pub fn to_event_page(
    calendar_id: &CalendarId,
    response: EventsListResponse,
) -> CalendarClientResult<EventPage> {
    let mut events = Vec::new();
    let mut recurring_events = Vec::new();

    for item in response.items {
        match classify(calendar_id, item).map_err(|e: GoogleCalendarError| {
            CalendarClientError::Request(e.to_string())
        })? {
            ClassifiedItem::Event(e) => events.push(e),
            ClassifiedItem::RecurringEvent(r) => recurring_events.push(r),
        }
    }

    Ok(EventPage {
        events,
        recurring_events,
        next_page_token: response.next_page_token,
        next_sync_token: response.next_sync_token,
    })
}
