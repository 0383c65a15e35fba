use shared::CalendarId;
use sqlx::FromRow;

/// Row shape of `calendars`. `refresh_token` is the AEAD ciphertext, never
/// the plaintext token — decryption happens one layer up, in the
/// repository, so this type never holds a secret in memory for longer than
/// the mapping step.
#[derive(Debug, Clone, FromRow)]
pub struct CalendarRow {
    pub id: CalendarId,
    pub name: String,
    pub refresh_token: Option<String>,
}
