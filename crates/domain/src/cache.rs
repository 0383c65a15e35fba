use shared::CalendarId;
use std::collections::HashMap;
use std::sync::RwLock;

/// Process-wide `CalendarID -> plaintext refresh token` cache.
///
/// Populated on any read from the calendars table that yields a non-null
/// token, consulted first by refresh-token lookups. No eviction: expected
/// scale is O(number of calendars).
#[derive(Default)]
pub struct RefreshTokenCache {
    tokens: RwLock<HashMap<CalendarId, String>>,
}

impl RefreshTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, calendar_id: &CalendarId) -> Option<String> {
        self.tokens.read().unwrap().get(calendar_id).cloned()
    }

    pub fn insert(&self, calendar_id: CalendarId, refresh_token: String) {
        self.tokens.write().unwrap().insert(calendar_id, refresh_token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit() {
        let cache = RefreshTokenCache::new();
        let id = CalendarId::new("cal-1");
        assert_eq!(cache.get(&id), None);
        cache.insert(id.clone(), "token".to_string());
        assert_eq!(cache.get(&id), Some("token".to_string()));
    }

    #[test]
    fn insert_overwrites() {
        let cache = RefreshTokenCache::new();
        let id = CalendarId::new("cal-1");
        cache.insert(id.clone(), "old".to_string());
        cache.insert(id.clone(), "new".to_string());
        assert_eq!(cache.get(&id), Some("new".to_string()));
    }
}
