use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{AppError, CalendarId, EventId};

use crate::entities::{Calendar, Channel, Event, NewCalendar, RecurringEvent};

pub type StoreResult<T> = Result<T, AppError>;

/// Narrow capability the OAuth `CalendarClient` needs from the Store,
/// breaking the Store <-> CalendarClient reference cycle: the Store needs
/// no reference to the client, but the OAuth client needs a way to resolve
/// a calendar's plaintext refresh token.
#[async_trait]
pub trait RefreshTokenResolver: Send + Sync {
    async fn get_refresh_token(&self, calendar_id: &CalendarId) -> StoreResult<Option<String>>;
}

/// Handle to an in-progress unit of work. Only the engine-level operations
/// that must run inside the same transaction are exposed here; acquiring
/// one and driving it to commit/rollback is the job of `Store::with_transaction`.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn lock_calendar(&mut self, calendar_id: &CalendarId) -> StoreResult<()>;

    /// Bulk upsert-if-different keyed by `(calendar_id, id)`. All events
    /// must share `calendar_id` or the call fails. Returns the count of
    /// rows actually written. Input is sorted by `id` before writing to
    /// produce a deterministic lock order.
    async fn sync_events(
        &mut self,
        calendar_id: &CalendarId,
        events: Vec<Event>,
    ) -> StoreResult<u64>;

    /// Performs the master-and-instances reconciliation described in the
    /// engine: upsert the master (cancel-twinning an existing live event of
    /// the same id first), reconcile instances keyed by `id`, then cancel
    /// the tail: events under this master with `start >= after` that are no
    /// longer present in `instances`.
    async fn sync_recurring_event_and_instances(
        &mut self,
        master: RecurringEvent,
        instances: Vec<Event>,
        after: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn list_active_channels_with_lock(
        &mut self,
        calendar_id: &CalendarId,
    ) -> StoreResult<Vec<Channel>>;

    async fn create_channel_history(&mut self, channel: Channel) -> StoreResult<()>;

    async fn stop_active_channels(&mut self, calendar_id: &CalendarId) -> StoreResult<()>;

    async fn create_sync_history(
        &mut self,
        calendar_id: &CalendarId,
        sync_time: DateTime<Utc>,
        next_sync_token: &str,
        updated_event_count: u64,
    ) -> StoreResult<()>;

    async fn create_sync_future_instance_history(
        &mut self,
        calendar_id: &CalendarId,
        sync_time: DateTime<Utc>,
        updated_event_count: u64,
    ) -> StoreResult<()>;

    /// Fails `DomainError::CalendarAlreadyExists` on unique-violation;
    /// encrypts `refresh_token` before persisting.
    async fn create_calendar(&mut self, calendar: NewCalendar) -> StoreResult<Calendar>;
}

/// The local transactional repository: reads plus the single entry point
/// that opens a transaction, hands the caller a handle, and commits on
/// `Ok`/rolls back on `Err` (the closure-in-transaction pattern).
#[async_trait]
pub trait Store: Send + Sync {
    async fn with_transaction<'a, F, Fut, T>(&'a self, f: F) -> StoreResult<T>
    where
        F: FnOnce(Box<dyn StoreTransaction + 'a>) -> Fut + Send + 'a,
        Fut: std::future::Future<Output = StoreResult<T>> + Send + 'a,
        T: Send + 'a;

    async fn get_calendar(&self, calendar_id: &CalendarId) -> StoreResult<Option<Calendar>>;

    async fn list_calendars(&self) -> StoreResult<Vec<Calendar>>;

    /// Cache-then-database: consults the in-memory refresh-token cache
    /// first, falls back to decrypting the stored ciphertext on miss.
    async fn get_refresh_token(&self, calendar_id: &CalendarId) -> StoreResult<Option<String>>;

    /// Empty string when no history exists for this calendar.
    async fn get_latest_sync_token(&self, calendar_id: &CalendarId) -> StoreResult<String>;

    async fn list_active_recurring_events_with_after(
        &self,
        calendar_id: &CalendarId,
        after: DateTime<Utc>,
    ) -> StoreResult<Vec<RecurringEvent>>;

    async fn list_active_recurring_events_by_ids(
        &self,
        calendar_id: &CalendarId,
        ids: &[EventId],
    ) -> StoreResult<Vec<RecurringEvent>>;
}
