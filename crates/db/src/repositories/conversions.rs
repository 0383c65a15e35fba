use std::str::FromStr;

use domain::{Calendar, Channel, Event, EventStatus, RecurringEvent};
use shared::AppError;

use crate::models::{CalendarRow, ChannelRow, EventRow, RecurringEventRow};

fn parse_status(raw: &str) -> Result<EventStatus, AppError> {
    EventStatus::from_str(raw).map_err(AppError::Internal)
}

/// Maps a persisted row plus its already-decrypted plaintext token into the
/// domain entity. `plaintext_token` is `None` in shared-client mode, or when
/// the cache/decryption step hasn't been performed by the caller.
pub fn row_to_calendar(row: CalendarRow, plaintext_token: Option<String>) -> Calendar {
    Calendar {
        id: row.id,
        name: row.name,
        refresh_token: plaintext_token,
    }
}

pub fn row_to_event(row: EventRow) -> Result<Event, AppError> {
    Ok(Event {
        calendar_id: row.calendar_id,
        id: row.id,
        recurring_event_id: row.recurring_event_id,
        summary: row.summary,
        start: row.start,
        end: row.end,
        status: parse_status(&row.status)?,
    })
}

pub fn row_to_recurring_event(row: RecurringEventRow) -> Result<RecurringEvent, AppError> {
    Ok(RecurringEvent {
        calendar_id: row.calendar_id,
        id: row.id,
        summary: row.summary,
        recurrence: row.recurrence,
        start: row.start,
        end: row.end,
        status: parse_status(&row.status)?,
    })
}

pub fn row_to_channel(row: ChannelRow) -> Channel {
    Channel {
        calendar_id: row.calendar_id,
        resource_id: row.resource_id,
        start_time: row.start_time,
        expiration: row.expiration,
        is_stopped: row.is_stopped,
    }
}
