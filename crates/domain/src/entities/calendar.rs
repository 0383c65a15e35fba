use serde::{Deserialize, Serialize};
use shared::CalendarId;

/// A mirrored calendar.
///
/// `refresh_token` (plaintext, resolved through the cache or decrypted on
/// read) is present exactly when the deployment runs in OAuth mode; it is
/// always absent in shared-client mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: CalendarId,
    pub name: String,
    pub refresh_token: Option<String>,
}

/// Command input for `CreateCalendar`.
#[derive(Debug, Clone)]
pub struct NewCalendar {
    pub id: CalendarId,
    pub name: String,
    pub refresh_token: Option<String>,
}
