use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use super::error::GoogleCalendarError;
use super::models::EventDateTime;

/// Parses a provider `EventDateTime`: RFC3339 when `date_time` is set; for
/// all-day values (`date` only) the per-response `time_zone` determines the
/// midnight instant. `None` when neither field is set.
pub fn parse_event_date_time(
    value: &EventDateTime,
) -> Result<Option<DateTime<Utc>>, GoogleCalendarError> {
    if let Some(date_time) = &value.date_time {
        let parsed = DateTime::parse_from_rfc3339(date_time)
            .map_err(|e| GoogleCalendarError::InvalidDateTime(e.to_string()))?;
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    if let Some(date) = &value.date {
        let naive = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| GoogleCalendarError::InvalidDateTime(e.to_string()))?;
        let midnight = naive
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| GoogleCalendarError::InvalidDateTime(date.clone()))?;

        let zone: Tz = value
            .time_zone
            .as_deref()
            .unwrap_or("UTC")
            .parse()
            .map_err(|_| {
                GoogleCalendarError::InvalidDateTime(format!(
                    "unknown time zone {:?}",
                    value.time_zone
                ))
            })?;

        // DST-ambiguous local midnights (e.g. a fall-back transition) are
        // resolved to the earlier of the two valid offsets; a spring-forward
        // gap is resolved to the instant immediately following it.
        let localized = match zone.from_local_datetime(&midnight) {
            chrono::LocalResult::Single(t) => t,
            chrono::LocalResult::Ambiguous(earliest, _latest) => earliest,
            chrono::LocalResult::None => zone
                .from_local_datetime(&(midnight + chrono::Duration::hours(1)))
                .single()
                .ok_or_else(|| GoogleCalendarError::InvalidDateTime(date.clone()))?,
        };

        return Ok(Some(localized.with_timezone(&Utc)));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_date_time() {
        let value = EventDateTime {
            date: None,
            date_time: Some("2024-06-01T09:00:00-07:00".to_string()),
            time_zone: Some("America/Los_Angeles".to_string()),
        };
        let parsed = parse_event_date_time(&value).unwrap().unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-06-01T16:00:00+00:00");
    }

    #[test]
    fn parses_all_day_date_in_zone() {
        let value = EventDateTime {
            date: Some("2024-06-01".to_string()),
            date_time: None,
            time_zone: Some("America/Los_Angeles".to_string()),
        };
        let parsed = parse_event_date_time(&value).unwrap().unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-06-01T07:00:00+00:00");
    }

    #[test]
    fn all_day_defaults_to_utc_without_time_zone() {
        let value = EventDateTime {
            date: Some("2024-06-01".to_string()),
            date_time: None,
            time_zone: None,
        };
        let parsed = parse_event_date_time(&value).unwrap().unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-06-01T00:00:00+00:00");
    }

    #[test]
    fn neither_field_set_yields_none() {
        let value = EventDateTime {
            date: None,
            date_time: None,
            time_zone: None,
        };
        assert_eq!(parse_event_date_time(&value).unwrap(), None);
    }

    #[test]
    fn dst_fall_back_ambiguous_midnight_resolves_to_earlier_offset() {
        // 2024-11-03 is the US fall-back date; local midnight itself is not
        // ambiguous (the repeated hour is 1-2am), so this exercises the
        // ordinary single-result path at a DST boundary date.
        let value = EventDateTime {
            date: Some("2024-11-03".to_string()),
            date_time: None,
            time_zone: Some("America/New_York".to_string()),
        };
        assert!(parse_event_date_time(&value).unwrap().is_some());
    }
}
