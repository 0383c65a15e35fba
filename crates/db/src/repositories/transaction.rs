use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Calendar, Channel, Event, NewCalendar, RecurringEvent, StoreResult, StoreTransaction};
use shared::{AppError, CalendarId};
use sqlx::{Postgres, Transaction};

use crate::models::ChannelRow;
use crate::repositories::conversions::row_to_channel;
use crate::repositories::store::{encrypt_refresh_token, map_create_calendar_error};
use domain::{RefreshTokenCache, RefreshTokenCipher};

/// Borrowed handle into an in-progress transaction, the only thing
/// `Store::with_transaction` hands to its caller's closure.
pub struct PgStoreTransaction<'a> {
    tx: &'a mut Transaction<'static, Postgres>,
    cipher: &'a RefreshTokenCipher,
    cache: &'a RefreshTokenCache,
}

impl<'a> PgStoreTransaction<'a> {
    pub fn new(
        tx: &'a mut Transaction<'static, Postgres>,
        cipher: &'a RefreshTokenCipher,
        cache: &'a RefreshTokenCache,
    ) -> Self {
        Self { tx, cipher, cache }
    }

    /// Upserts a single event, skipping the write when no field changed.
    /// Returns 1 if a row was inserted or updated, 0 if the existing row
    /// was already identical.
    async fn upsert_event(&mut self, event: &Event) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO events (calendar_id, id, recurring_event_id, summary, start, "end", status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (calendar_id, id) DO UPDATE SET
                recurring_event_id = EXCLUDED.recurring_event_id,
                summary = EXCLUDED.summary,
                start = EXCLUDED.start,
                "end" = EXCLUDED."end",
                status = EXCLUDED.status
            WHERE events.recurring_event_id IS DISTINCT FROM EXCLUDED.recurring_event_id
               OR events.summary IS DISTINCT FROM EXCLUDED.summary
               OR events.start IS DISTINCT FROM EXCLUDED.start
               OR events."end" IS DISTINCT FROM EXCLUDED."end"
               OR events.status IS DISTINCT FROM EXCLUDED.status
            "#,
        )
        .bind(event.calendar_id.as_str())
        .bind(event.id.as_str())
        .bind(event.recurring_event_id.as_ref().map(|id| id.as_str()))
        .bind(&event.summary)
        .bind(event.start)
        .bind(event.end)
        .bind(event.status.as_str())
        .execute(&mut **self.tx)
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected())
    }

    async fn upsert_recurring_event(&mut self, master: &RecurringEvent) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO recurring_events (calendar_id, id, summary, recurrence, start, "end", status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (calendar_id, id) DO UPDATE SET
                summary = EXCLUDED.summary,
                recurrence = EXCLUDED.recurrence,
                start = EXCLUDED.start,
                "end" = EXCLUDED."end",
                status = EXCLUDED.status
            WHERE recurring_events.summary IS DISTINCT FROM EXCLUDED.summary
               OR recurring_events.recurrence IS DISTINCT FROM EXCLUDED.recurrence
               OR recurring_events.start IS DISTINCT FROM EXCLUDED.start
               OR recurring_events."end" IS DISTINCT FROM EXCLUDED."end"
               OR recurring_events.status IS DISTINCT FROM EXCLUDED.status
            "#,
        )
        .bind(master.calendar_id.as_str())
        .bind(master.id.as_str())
        .bind(&master.summary)
        .bind(&master.recurrence)
        .bind(master.start)
        .bind(master.end)
        .bind(master.status.as_str())
        .execute(&mut **self.tx)
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl<'a> StoreTransaction for PgStoreTransaction<'a> {
    async fn lock_calendar(&mut self, calendar_id: &CalendarId) -> StoreResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(calendar_id.as_str())
            .execute(&mut **self.tx)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn sync_events(&mut self, calendar_id: &CalendarId, mut events: Vec<Event>) -> StoreResult<u64> {
        events.sort_by(|a, b| a.id.cmp(&b.id));

        let mut written = 0u64;
        for event in &events {
            debug_assert_eq!(event.calendar_id.as_str(), calendar_id.as_str());
            written += self.upsert_event(event).await?;
        }
        Ok(written)
    }

    async fn sync_recurring_event_and_instances(
        &mut self,
        master: RecurringEvent,
        mut instances: Vec<Event>,
        after: DateTime<Utc>,
    ) -> StoreResult<u64> {
        instances.sort_by(|a, b| a.id.cmp(&b.id));

        let mut written = 0u64;

        // Cancel-twin: if a one-off event previously occupied this id, fold
        // it into cancelled before the master takes over the id.
        let twin_result = sqlx::query(
            r#"
            UPDATE events SET status = 'cancelled'
            WHERE calendar_id = $1 AND id = $2 AND status != 'cancelled'
            "#,
        )
        .bind(master.calendar_id.as_str())
        .bind(master.id.as_str())
        .execute(&mut **self.tx)
        .await
        .map_err(AppError::from)?;
        written += twin_result.rows_affected();

        written += self.upsert_recurring_event(&master).await?;

        for instance in &instances {
            written += self.upsert_event(instance).await?;
        }

        let instance_ids: Vec<String> = instances.iter().map(|e| e.id.as_str().to_string()).collect();
        let tail_result = sqlx::query(
            r#"
            UPDATE events SET status = 'cancelled'
            WHERE calendar_id = $1
              AND recurring_event_id = $2
              AND start >= $3
              AND status != 'cancelled'
              AND NOT (id = ANY($4))
            "#,
        )
        .bind(master.calendar_id.as_str())
        .bind(master.id.as_str())
        .bind(after)
        .bind(&instance_ids)
        .execute(&mut **self.tx)
        .await
        .map_err(AppError::from)?;
        written += tail_result.rows_affected();

        Ok(written)
    }

    async fn list_active_channels_with_lock(&mut self, calendar_id: &CalendarId) -> StoreResult<Vec<Channel>> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            r#"
            SELECT calendar_id, resource_id, start_time, expiration, is_stopped
            FROM channel_histories
            WHERE calendar_id = $1 AND is_stopped = false AND expiration > now()
            FOR UPDATE
            "#,
        )
        .bind(calendar_id.as_str())
        .fetch_all(&mut **self.tx)
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_channel).collect())
    }

    async fn create_channel_history(&mut self, channel: Channel) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO channel_histories (calendar_id, resource_id, start_time, expiration, is_stopped)
            VALUES ($1, $2, $3, $4, false)
            "#,
        )
        .bind(channel.calendar_id.as_str())
        .bind(channel.resource_id.as_str())
        .bind(channel.start_time)
        .bind(channel.expiration)
        .execute(&mut **self.tx)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn stop_active_channels(&mut self, calendar_id: &CalendarId) -> StoreResult<()> {
        sqlx::query(
            "UPDATE channel_histories SET is_stopped = true WHERE calendar_id = $1 AND is_stopped = false",
        )
        .bind(calendar_id.as_str())
        .execute(&mut **self.tx)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn create_sync_history(
        &mut self,
        calendar_id: &CalendarId,
        sync_time: DateTime<Utc>,
        next_sync_token: &str,
        updated_event_count: u64,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_histories (calendar_id, sync_time, next_sync_token, updated_event_count)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(calendar_id.as_str())
        .bind(sync_time)
        .bind(next_sync_token)
        .bind(updated_event_count as i64)
        .execute(&mut **self.tx)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn create_sync_future_instance_history(
        &mut self,
        calendar_id: &CalendarId,
        sync_time: DateTime<Utc>,
        updated_event_count: u64,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_future_instance_histories (calendar_id, sync_time, updated_event_count)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(calendar_id.as_str())
        .bind(sync_time)
        .bind(updated_event_count as i64)
        .execute(&mut **self.tx)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn create_calendar(&mut self, calendar: NewCalendar) -> StoreResult<Calendar> {
        let ciphertext = encrypt_refresh_token(self.cipher, &calendar)?;

        sqlx::query("INSERT INTO calendars (id, name, refresh_token) VALUES ($1, $2, $3)")
            .bind(calendar.id.as_str())
            .bind(&calendar.name)
            .bind(&ciphertext)
            .execute(&mut **self.tx)
            .await
            .map_err(map_create_calendar_error)?;

        if let Some(plaintext) = &calendar.refresh_token {
            self.cache.insert(calendar.id.clone(), plaintext.clone());
        }

        Ok(Calendar {
            id: calendar.id,
            name: calendar.name,
            refresh_token: calendar.refresh_token,
        })
    }
}
