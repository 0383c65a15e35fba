use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared::{AppError, CalendarId, DomainError, EventId};

use crate::calendar_client::{CalendarClient, CalendarClientError, EventListing};
use crate::clock::Clock;
use crate::entities::{Event, EventStatus, RecurringEvent};
use crate::store::Store;

const SYNC_LOOKBACK: Duration = Duration::days(7);
const FUTURE_HORIZON: Duration = Duration::days(365);
const EXTENSION_WINDOW: Duration = Duration::days(8);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub next_sync_token: String,
    pub updated_event_count: u64,
}

/// The reconciliation algorithm. Depends on `Clock`, `CalendarClient` and
/// `Store` through their trait interfaces so it can run against either
/// calendar-client deployment mode and against an in-memory `Store` in
/// tests.
pub struct SyncEngine<C: ?Sized, S> {
    clock: Arc<dyn Clock>,
    calendar_client: Arc<C>,
    store: Arc<S>,
}

impl<C: ?Sized, S> SyncEngine<C, S>
where
    C: CalendarClient,
    S: Store,
{
    pub fn new(clock: Arc<dyn Clock>, calendar_client: Arc<C>, store: Arc<S>) -> Self {
        Self {
            clock,
            calendar_client,
            store,
        }
    }

    pub async fn sync(&self, calendar_id: &CalendarId) -> Result<SyncOutcome, AppError> {
        if self.store.get_calendar(calendar_id).await?.is_none() {
            return Err(DomainError::CalendarNotFound.into());
        }

        let listing = self.fetch_listing(calendar_id).await?;
        let next_sync_token = listing.next_sync_token;
        let sync_time = self.clock.now();

        let (events, masters) = self
            .reclassify_cancelled_masters(calendar_id, listing.events, listing.recurring_events)
            .await?;

        let changed = self
            .resolve_changed_masters(calendar_id, masters, sync_time)
            .await?;

        let after = sync_time - SYNC_LOOKBACK;
        let calendar_id = calendar_id.clone();
        let token_for_history = next_sync_token.clone();
        let updated_event_count = self
            .store
            .with_transaction(move |mut tx| {
                let calendar_id = calendar_id.clone();
                let next_sync_token = token_for_history.clone();
                Box::pin(async move {
                    tx.lock_calendar(&calendar_id).await?;

                    let mut total = 0u64;
                    for (master, instances) in changed {
                        total += tx
                            .sync_recurring_event_and_instances(master, instances, after)
                            .await?;
                    }
                    total += tx.sync_events(&calendar_id, events).await?;
                    tx.create_sync_history(&calendar_id, sync_time, &next_sync_token, total)
                        .await?;
                    Ok(total)
                })
            })
            .await?;

        Ok(SyncOutcome {
            next_sync_token,
            updated_event_count,
        })
    }

    /// Chooses the incremental-vs-full listing path (§4.3.1 step 2).
    async fn fetch_listing(&self, calendar_id: &CalendarId) -> Result<EventListing, AppError> {
        let stored_token = self.store.get_latest_sync_token(calendar_id).await?;

        if stored_token.is_empty() {
            tracing::info!(calendar_id = %calendar_id, "sync all events");
            return self.list_since_floor(calendar_id).await;
        }

        match self
            .calendar_client
            .list_events_with_token(calendar_id, &stored_token)
            .await
        {
            Ok(listing) => {
                tracing::info!(calendar_id = %calendar_id, "sync by token");
                Ok(listing)
            }
            Err(CalendarClientError::SyncTokenStale) => {
                tracing::info!(calendar_id = %calendar_id, "sync token is old, sync all events");
                self.list_since_floor(calendar_id).await
            }
            Err(e) => Err(client_error_to_app_error(e)),
        }
    }

    async fn list_since_floor(&self, calendar_id: &CalendarId) -> Result<EventListing, AppError> {
        let floor = self.clock.today() - SYNC_LOOKBACK;
        self.calendar_client
            .list_events_since(calendar_id, floor)
            .await
            .map_err(client_error_to_app_error)
    }

    /// §4.3.2: before resolving instances, fold event/master transitions
    /// into the returned lists so neither direction silently drops a row.
    async fn reclassify_cancelled_masters(
        &self,
        calendar_id: &CalendarId,
        events: Vec<Event>,
        mut masters: Vec<RecurringEvent>,
    ) -> Result<(Vec<Event>, Vec<RecurringEvent>), AppError> {
        let event_ids: Vec<EventId> = events.iter().map(|e| e.id.clone()).collect();
        if event_ids.is_empty() {
            return Ok((events, masters));
        }

        let active_masters = self
            .store
            .list_active_recurring_events_by_ids(calendar_id, &event_ids)
            .await?;

        let mut kept_events = Vec::with_capacity(events.len());
        for event in events {
            let matches_active_master = active_masters.iter().any(|m| m.id == event.id);
            if matches_active_master {
                let twin = RecurringEvent::new_cancelled_master_from_event(
                    &event,
                    "[]".to_string(),
                );
                masters.push(twin);
                if event.status != EventStatus::Cancelled {
                    kept_events.push(event);
                }
            } else {
                kept_events.push(event);
            }
        }

        Ok((kept_events, masters))
    }

    /// §4.3.1 step 5: skip masters identical to what's stored, fetch
    /// instances for the rest.
    async fn resolve_changed_masters(
        &self,
        calendar_id: &CalendarId,
        masters: Vec<RecurringEvent>,
        sync_time: DateTime<Utc>,
    ) -> Result<Vec<(RecurringEvent, Vec<Event>)>, AppError> {
        if masters.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<EventId> = masters.iter().map(|m| m.id.clone()).collect();
        let stored = self
            .store
            .list_active_recurring_events_by_ids(calendar_id, &ids)
            .await?;

        let mut changed = Vec::new();
        for master in masters {
            let unchanged = stored
                .iter()
                .find(|s| s.id == master.id)
                .map(|s| s.content_eq(&master))
                .unwrap_or(false);
            if unchanged {
                continue;
            }

            let instances = if master.is_cancelled() {
                Vec::new()
            } else {
                self.calendar_client
                    .list_instances_between(
                        calendar_id,
                        &master.id,
                        sync_time - SYNC_LOOKBACK,
                        sync_time + FUTURE_HORIZON,
                    )
                    .await
                    .map_err(client_error_to_app_error)?
            };
            changed.push((master, instances));
        }

        Ok(changed)
    }

    /// §4.3.4: periodically extends the rolling instance-expansion window
    /// for every calendar's active masters. Driven externally by a
    /// scheduler; not part of the incremental-sync cursor.
    pub async fn sync_future_instance_all(&self) -> Result<u64, AppError> {
        let calendars = self.store.list_calendars().await?;
        let mut total = 0u64;

        for calendar in calendars {
            let now = self.clock.now();
            let window_start = now + FUTURE_HORIZON - EXTENSION_WINDOW;
            let window_end = now + FUTURE_HORIZON;

            let masters = self
                .store
                .list_active_recurring_events_with_after(&calendar.id, DateTime::<Utc>::MIN_UTC)
                .await?;

            let mut changed = Vec::new();
            for master in masters {
                let instances = self
                    .calendar_client
                    .list_instances_between(&calendar.id, &master.id, window_start, window_end)
                    .await
                    .map_err(client_error_to_app_error)?;
                if !instances.is_empty() {
                    changed.push((master, instances));
                }
            }

            if changed.is_empty() {
                continue;
            }

            let calendar_id = calendar.id.clone();
            let count = self
                .store
                .with_transaction(move |mut tx| {
                    let calendar_id = calendar_id.clone();
                    Box::pin(async move {
                        tx.lock_calendar(&calendar_id).await?;
                        let mut count = 0u64;
                        for (master, instances) in changed {
                            count += tx
                                .sync_recurring_event_and_instances(master, instances, window_start)
                                .await?;
                        }
                        tx.create_sync_future_instance_history(&calendar_id, now, count)
                            .await?;
                        Ok(count)
                    })
                })
                .await?;
            total += count;
        }

        Ok(total)
    }
}

fn client_error_to_app_error(err: CalendarClientError) -> AppError {
    AppError::ExternalApi(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::future::Future;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use tracing_test::traced_test;

    use super::*;
    use crate::calendar_client::CalendarClientResult;
    use crate::entities::{Calendar, Channel, NewCalendar};
    use crate::store::{StoreResult, StoreTransaction};

    fn evt(calendar_id: &CalendarId, id: &str, status: EventStatus) -> Event {
        Event {
            calendar_id: calendar_id.clone(),
            id: EventId::new(id),
            recurring_event_id: None,
            summary: id.to_string(),
            start: None,
            end: None,
            status,
        }
    }

    fn instance_of(master: &RecurringEvent, id: &str, start_hour: u32) -> Event {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let start = Utc.from_utc_datetime(&date.and_hms_opt(start_hour, 0, 0).unwrap());
        Event {
            calendar_id: master.calendar_id.clone(),
            id: EventId::new(id),
            recurring_event_id: Some(master.id.clone()),
            summary: master.summary.clone(),
            start: Some(start),
            end: Some(start + Duration::hours(1)),
            status: EventStatus::Confirmed,
        }
    }

    fn master(calendar_id: &CalendarId, id: &str, recurrence: &str) -> RecurringEvent {
        RecurringEvent {
            calendar_id: calendar_id.clone(),
            id: EventId::new(id),
            summary: id.to_string(),
            recurrence: recurrence.to_string(),
            start: None,
            end: None,
            status: EventStatus::Confirmed,
        }
    }

    fn listing(events: Vec<Event>, masters: Vec<RecurringEvent>, next_sync_token: &str) -> EventListing {
        EventListing {
            events,
            recurring_events: masters,
            next_sync_token: next_sync_token.to_string(),
        }
    }

    #[derive(Default)]
    struct Db {
        calendars: HashMap<CalendarId, Calendar>,
        events: HashMap<(CalendarId, EventId), Event>,
        recurring_events: HashMap<(CalendarId, EventId), RecurringEvent>,
        sync_tokens: HashMap<CalendarId, String>,
    }

    /// In-memory double for `Store`; transactions operate directly on the
    /// shared `Mutex<Db>` since there is nothing to roll back to beyond the
    /// closure's own `Err` short-circuiting before any write happens.
    struct InMemoryStore {
        db: Mutex<Db>,
    }

    impl InMemoryStore {
        fn with_calendar(calendar_id: &CalendarId) -> Self {
            let mut db = Db::default();
            db.calendars.insert(
                calendar_id.clone(),
                Calendar {
                    id: calendar_id.clone(),
                    name: "test".to_string(),
                    refresh_token: None,
                },
            );
            Self { db: Mutex::new(db) }
        }

        fn event(&self, calendar_id: &CalendarId, id: &str) -> Option<Event> {
            self.db
                .lock()
                .unwrap()
                .events
                .get(&(calendar_id.clone(), EventId::new(id)))
                .cloned()
        }
    }

    struct InMemoryTx<'a> {
        db: &'a Mutex<Db>,
    }

    #[async_trait]
    impl<'a> StoreTransaction for InMemoryTx<'a> {
        async fn lock_calendar(&mut self, _calendar_id: &CalendarId) -> StoreResult<()> {
            Ok(())
        }

        async fn sync_events(&mut self, calendar_id: &CalendarId, events: Vec<Event>) -> StoreResult<u64> {
            let mut db = self.db.lock().unwrap();
            let mut written = 0u64;
            for event in events {
                let key = (calendar_id.clone(), event.id.clone());
                let unchanged = db.events.get(&key).map(|e| e.content_eq(&event)).unwrap_or(false);
                if !unchanged {
                    written += 1;
                }
                db.events.insert(key, event);
            }
            Ok(written)
        }

        async fn sync_recurring_event_and_instances(
            &mut self,
            master: RecurringEvent,
            instances: Vec<Event>,
            after: DateTime<Utc>,
        ) -> StoreResult<u64> {
            let mut db = self.db.lock().unwrap();
            let mut written = 0u64;

            let twin_key = (master.calendar_id.clone(), master.id.clone());
            if let Some(twin) = db.events.get_mut(&twin_key) {
                if twin.status != EventStatus::Cancelled {
                    twin.status = EventStatus::Cancelled;
                    written += 1;
                }
            }

            let master_key = (master.calendar_id.clone(), master.id.clone());
            let unchanged = db
                .recurring_events
                .get(&master_key)
                .map(|m| m.content_eq(&master))
                .unwrap_or(false);
            if !unchanged {
                written += 1;
            }
            db.recurring_events.insert(master_key, master.clone());

            let mut seen = HashSet::new();
            for instance in instances {
                seen.insert(instance.id.clone());
                let key = (instance.calendar_id.clone(), instance.id.clone());
                let unchanged = db.events.get(&key).map(|e| e.content_eq(&instance)).unwrap_or(false);
                if !unchanged {
                    written += 1;
                }
                db.events.insert(key, instance);
            }

            for ((cal_id, event_id), event) in db.events.iter_mut() {
                if *cal_id == master.calendar_id
                    && event.recurring_event_id.as_ref() == Some(&master.id)
                    && event.status != EventStatus::Cancelled
                    && event.start.map(|s| s >= after).unwrap_or(true)
                    && !seen.contains(event_id)
                {
                    event.status = EventStatus::Cancelled;
                    written += 1;
                }
            }

            Ok(written)
        }

        async fn list_active_channels_with_lock(&mut self, _calendar_id: &CalendarId) -> StoreResult<Vec<Channel>> {
            Ok(Vec::new())
        }

        async fn create_channel_history(&mut self, _channel: Channel) -> StoreResult<()> {
            Ok(())
        }

        async fn stop_active_channels(&mut self, _calendar_id: &CalendarId) -> StoreResult<()> {
            Ok(())
        }

        async fn create_sync_history(
            &mut self,
            calendar_id: &CalendarId,
            _sync_time: DateTime<Utc>,
            next_sync_token: &str,
            _updated_event_count: u64,
        ) -> StoreResult<()> {
            self.db
                .lock()
                .unwrap()
                .sync_tokens
                .insert(calendar_id.clone(), next_sync_token.to_string());
            Ok(())
        }

        async fn create_sync_future_instance_history(
            &mut self,
            _calendar_id: &CalendarId,
            _sync_time: DateTime<Utc>,
            _updated_event_count: u64,
        ) -> StoreResult<()> {
            Ok(())
        }

        async fn create_calendar(&mut self, _calendar: NewCalendar) -> StoreResult<Calendar> {
            unimplemented!("not exercised by sync engine tests")
        }
    }

    #[async_trait]
    impl Store for InMemoryStore {
        async fn with_transaction<'a, F, Fut, T>(&'a self, f: F) -> StoreResult<T>
        where
            F: FnOnce(Box<dyn StoreTransaction + 'a>) -> Fut + Send + 'a,
            Fut: Future<Output = StoreResult<T>> + Send + 'a,
            T: Send + 'a,
        {
            let tx: Box<dyn StoreTransaction + 'a> = Box::new(InMemoryTx { db: &self.db });
            f(tx).await
        }

        async fn get_calendar(&self, calendar_id: &CalendarId) -> StoreResult<Option<Calendar>> {
            Ok(self.db.lock().unwrap().calendars.get(calendar_id).cloned())
        }

        async fn list_calendars(&self) -> StoreResult<Vec<Calendar>> {
            Ok(self.db.lock().unwrap().calendars.values().cloned().collect())
        }

        async fn get_refresh_token(&self, _calendar_id: &CalendarId) -> StoreResult<Option<String>> {
            Ok(None)
        }

        async fn get_latest_sync_token(&self, calendar_id: &CalendarId) -> StoreResult<String> {
            Ok(self
                .db
                .lock()
                .unwrap()
                .sync_tokens
                .get(calendar_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn list_active_recurring_events_with_after(
            &self,
            calendar_id: &CalendarId,
            _after: DateTime<Utc>,
        ) -> StoreResult<Vec<RecurringEvent>> {
            Ok(self
                .db
                .lock()
                .unwrap()
                .recurring_events
                .values()
                .filter(|m| m.calendar_id == *calendar_id && !m.is_cancelled())
                .cloned()
                .collect())
        }

        async fn list_active_recurring_events_by_ids(
            &self,
            calendar_id: &CalendarId,
            ids: &[EventId],
        ) -> StoreResult<Vec<RecurringEvent>> {
            Ok(self
                .db
                .lock()
                .unwrap()
                .recurring_events
                .values()
                .filter(|m| m.calendar_id == *calendar_id && !m.is_cancelled() && ids.contains(&m.id))
                .cloned()
                .collect())
        }
    }

    /// Scripted double for `CalendarClient`: each listing method is fed a
    /// queue of canned responses, consumed one per call; unscripted calls
    /// panic so a test immediately shows which interaction it didn't expect.
    #[derive(Default)]
    struct ScriptedCalendarClient {
        since_responses: Mutex<VecDeque<CalendarClientResult<EventListing>>>,
        token_responses: Mutex<VecDeque<CalendarClientResult<EventListing>>>,
        instances: Mutex<HashMap<EventId, Vec<Event>>>,
    }

    impl ScriptedCalendarClient {
        fn new() -> Self {
            Self::default()
        }

        fn push_since(&self, result: CalendarClientResult<EventListing>) {
            self.since_responses.lock().unwrap().push_back(result);
        }

        fn push_token(&self, result: CalendarClientResult<EventListing>) {
            self.token_responses.lock().unwrap().push_back(result);
        }

        fn set_instances(&self, master_id: &EventId, instances: Vec<Event>) {
            self.instances.lock().unwrap().insert(master_id.clone(), instances);
        }
    }

    #[async_trait]
    impl CalendarClient for ScriptedCalendarClient {
        async fn list_events_since(
            &self,
            _calendar_id: &CalendarId,
            _after: DateTime<Utc>,
        ) -> CalendarClientResult<EventListing> {
            self.since_responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unscripted list_events_since call")
        }

        async fn list_events_with_token(
            &self,
            _calendar_id: &CalendarId,
            _sync_token: &str,
        ) -> CalendarClientResult<EventListing> {
            self.token_responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unscripted list_events_with_token call")
        }

        async fn list_instances_between(
            &self,
            _calendar_id: &CalendarId,
            recurring_event_id: &EventId,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> CalendarClientResult<Vec<Event>> {
            Ok(self
                .instances
                .lock()
                .unwrap()
                .get(recurring_event_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn watch(&self, _calendar_id: &CalendarId) -> CalendarClientResult<crate::calendar_client::WatchRegistration> {
            unimplemented!("not exercised by sync engine tests")
        }

        async fn stop_watch(&self, _channel: &Channel) -> CalendarClientResult<()> {
            unimplemented!("not exercised by sync engine tests")
        }
    }

    fn engine(
        clock: Arc<FixedClock>,
        client: Arc<ScriptedCalendarClient>,
        store: Arc<InMemoryStore>,
    ) -> SyncEngine<ScriptedCalendarClient, InMemoryStore> {
        SyncEngine::new(clock, client, store)
    }

    fn fixed_clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()))
    }

    #[traced_test]
    #[tokio::test]
    async fn initial_sync_with_no_token_persists_all_events_and_stores_cursor() {
        let calendar_id = CalendarId::new("cal-1");
        let client = Arc::new(ScriptedCalendarClient::new());
        client.push_since(Ok(listing(
            vec![
                evt(&calendar_id, "E1", EventStatus::Confirmed),
                evt(&calendar_id, "E2", EventStatus::Confirmed),
            ],
            vec![],
            "T1",
        )));
        let store = Arc::new(InMemoryStore::with_calendar(&calendar_id));
        let engine = engine(fixed_clock(), client, Arc::clone(&store));

        let outcome = engine.sync(&calendar_id).await.unwrap();

        assert_eq!(outcome.next_sync_token, "T1");
        assert_eq!(outcome.updated_event_count, 2);
        assert_eq!(store.get_latest_sync_token(&calendar_id).await.unwrap(), "T1");
        assert!(store.event(&calendar_id, "E1").is_some());
        assert!(store.event(&calendar_id, "E2").is_some());
        assert!(logs_contain("sync all events"));
    }

    #[tokio::test]
    async fn incremental_sync_updates_status_and_advances_cursor() {
        let calendar_id = CalendarId::new("cal-1");
        let client = Arc::new(ScriptedCalendarClient::new());
        client.push_token(Ok(listing(
            vec![
                evt(&calendar_id, "E1", EventStatus::Cancelled),
                evt(&calendar_id, "E2", EventStatus::Confirmed),
            ],
            vec![],
            "T2",
        )));
        let store = Arc::new(InMemoryStore::with_calendar(&calendar_id));
        store
            .db
            .lock()
            .unwrap()
            .sync_tokens
            .insert(calendar_id.clone(), "T1".to_string());
        let engine = engine(fixed_clock(), client, Arc::clone(&store));

        let outcome = engine.sync(&calendar_id).await.unwrap();

        assert_eq!(outcome.next_sync_token, "T2");
        assert_eq!(store.event(&calendar_id, "E1").unwrap().status, EventStatus::Cancelled);
        assert_eq!(store.get_latest_sync_token(&calendar_id).await.unwrap(), "T2");
    }

    #[traced_test]
    #[tokio::test]
    async fn stale_token_falls_back_to_full_listing() {
        let calendar_id = CalendarId::new("cal-1");
        let client = Arc::new(ScriptedCalendarClient::new());
        client.push_token(Err(CalendarClientError::SyncTokenStale));
        client.push_since(Ok(listing(
            vec![
                evt(&calendar_id, "E1", EventStatus::Cancelled),
                evt(&calendar_id, "E2", EventStatus::Confirmed),
            ],
            vec![],
            "T3",
        )));
        let store = Arc::new(InMemoryStore::with_calendar(&calendar_id));
        store
            .db
            .lock()
            .unwrap()
            .sync_tokens
            .insert(calendar_id.clone(), "T1".to_string());
        let engine = engine(fixed_clock(), client, Arc::clone(&store));

        let outcome = engine.sync(&calendar_id).await.unwrap();

        assert_eq!(outcome.next_sync_token, "T3");
        assert_eq!(store.event(&calendar_id, "E1").unwrap().status, EventStatus::Cancelled);
        assert!(logs_contain("sync token is old, sync all events"));
    }

    #[tokio::test]
    async fn master_first_seen_persists_master_and_its_instances() {
        let calendar_id = CalendarId::new("cal-1");
        let r1 = master(&calendar_id, "R1", "[\"FREQ=DAILY\"]");
        let instances = vec![
            instance_of(&r1, "R1_1", 9),
            instance_of(&r1, "R1_2", 10),
            instance_of(&r1, "R1_3", 11),
        ];
        let client = Arc::new(ScriptedCalendarClient::new());
        client.set_instances(&r1.id, instances.clone());
        client.push_since(Ok(listing(vec![], vec![r1.clone()], "T1")));
        let store = Arc::new(InMemoryStore::with_calendar(&calendar_id));
        let engine = engine(fixed_clock(), client, Arc::clone(&store));

        engine.sync(&calendar_id).await.unwrap();

        let stored_master = store
            .db
            .lock()
            .unwrap()
            .recurring_events
            .get(&(calendar_id.clone(), r1.id.clone()))
            .cloned()
            .unwrap();
        assert_eq!(stored_master.id, r1.id);
        for instance in &instances {
            let stored = store.event(&calendar_id, instance.id.as_str()).unwrap();
            assert_eq!(stored.recurring_event_id, Some(r1.id.clone()));
        }
    }

    #[tokio::test]
    async fn dropped_instance_within_lookback_is_cancelled() {
        let calendar_id = CalendarId::new("cal-1");
        let r1 = master(&calendar_id, "R1", "[\"FREQ=DAILY\"]");
        let client = Arc::new(ScriptedCalendarClient::new());
        let store = Arc::new(InMemoryStore::with_calendar(&calendar_id));

        client.set_instances(
            &r1.id,
            vec![instance_of(&r1, "R1_1", 9), instance_of(&r1, "R1_2", 10), instance_of(&r1, "R1_3", 11)],
        );
        client.push_since(Ok(listing(vec![], vec![r1.clone()], "T1")));
        engine(fixed_clock(), Arc::clone(&client), Arc::clone(&store))
            .sync(&calendar_id)
            .await
            .unwrap();

        let mut r1_changed = r1.clone();
        r1_changed.summary = "R1 renamed".to_string();
        client.set_instances(&r1.id, vec![instance_of(&r1, "R1_1", 9), instance_of(&r1, "R1_2", 10)]);
        client.push_token(Ok(listing(vec![], vec![r1_changed], "T2")));
        store
            .db
            .lock()
            .unwrap()
            .sync_tokens
            .insert(calendar_id.clone(), "T1".to_string());
        engine(fixed_clock(), client, Arc::clone(&store))
            .sync(&calendar_id)
            .await
            .unwrap();

        assert_eq!(store.event(&calendar_id, "R1_1").unwrap().status, EventStatus::Confirmed);
        assert_eq!(store.event(&calendar_id, "R1_2").unwrap().status, EventStatus::Confirmed);
        assert_eq!(store.event(&calendar_id, "R1_3").unwrap().status, EventStatus::Cancelled);
    }

    #[tokio::test]
    async fn event_to_master_transition_cancels_the_event_twin_and_creates_the_master() {
        let calendar_id = CalendarId::new("cal-1");
        let store = Arc::new(InMemoryStore::with_calendar(&calendar_id));
        store
            .db
            .lock()
            .unwrap()
            .events
            .insert((calendar_id.clone(), EventId::new("E1")), evt(&calendar_id, "E1", EventStatus::Confirmed));

        let r1 = master(&calendar_id, "E1", "[\"FREQ=WEEKLY\"]");
        let instances = vec![instance_of(&r1, "E1_1", 9)];
        let client = Arc::new(ScriptedCalendarClient::new());
        client.set_instances(&r1.id, instances.clone());
        client.push_since(Ok(listing(vec![], vec![r1.clone()], "T1")));
        let engine = engine(fixed_clock(), client, Arc::clone(&store));

        engine.sync(&calendar_id).await.unwrap();

        assert_eq!(store.event(&calendar_id, "E1").unwrap().status, EventStatus::Cancelled);
        let stored_master = store
            .db
            .lock()
            .unwrap()
            .recurring_events
            .get(&(calendar_id.clone(), EventId::new("E1")))
            .cloned()
            .unwrap();
        assert_eq!(stored_master.id, EventId::new("E1"));
        assert!(store.event(&calendar_id, "E1_1").is_some());
    }

    #[tokio::test]
    async fn repeating_an_unchanged_sync_is_a_no_op() {
        let calendar_id = CalendarId::new("cal-1");
        let client = Arc::new(ScriptedCalendarClient::new());
        client.push_since(Ok(listing(vec![evt(&calendar_id, "E1", EventStatus::Confirmed)], vec![], "T1")));
        client.push_token(Ok(listing(vec![evt(&calendar_id, "E1", EventStatus::Confirmed)], vec![], "T2")));
        let store = Arc::new(InMemoryStore::with_calendar(&calendar_id));
        let engine_ref = engine(fixed_clock(), Arc::clone(&client), Arc::clone(&store));

        let first = engine_ref.sync(&calendar_id).await.unwrap();
        assert_eq!(first.updated_event_count, 1);

        store
            .db
            .lock()
            .unwrap()
            .sync_tokens
            .insert(calendar_id.clone(), "T1".to_string());
        let second = engine(fixed_clock(), client, store)
            .sync(&calendar_id)
            .await
            .unwrap();
        assert_eq!(second.updated_event_count, 0);
        assert_eq!(second.next_sync_token, "T2");
    }

    #[tokio::test]
    async fn syncing_an_unknown_calendar_fails() {
        let calendar_id = CalendarId::new("ghost");
        let client = Arc::new(ScriptedCalendarClient::new());
        let store = Arc::new(InMemoryStore::with_calendar(&CalendarId::new("cal-1")));
        let engine = engine(fixed_clock(), client, store);

        let err = engine.sync(&calendar_id).await.unwrap_err();
        assert!(matches!(err, AppError::Domain(shared::DomainError::CalendarNotFound)));
    }
}
