use domain::CalendarClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GoogleCalendarError {
    #[error("request error: {0}")]
    Request(String),

    #[error("invalid date/time: {0}")]
    InvalidDateTime(String),

    #[error("api error: {0}")]
    Api(String),
}

/// The provider signals a stale sync token either as HTTP 410, or with a
/// reason string specific to the deployment; both are treated the same way
/// and converted into the typed signal the engine matches on.
pub fn is_sync_token_stale(status: reqwest::StatusCode, body: &str) -> bool {
    status == reqwest::StatusCode::GONE
        || body.contains("fullSyncRequired")
        || body.contains("sync token is no longer valid")
}

impl From<GoogleCalendarError> for CalendarClientError {
    fn from(err: GoogleCalendarError) -> Self {
        CalendarClientError::Request(err.to_string())
    }
}

impl From<reqwest::Error> for GoogleCalendarError {
    fn from(err: reqwest::Error) -> Self {
        GoogleCalendarError::Request(err.to_string())
    }
}
