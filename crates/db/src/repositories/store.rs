use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    Calendar, NewCalendar, RefreshTokenCache, RefreshTokenCipher, RefreshTokenResolver,
    RecurringEvent, Store, StoreResult, StoreTransaction,
};
use futures::FutureExt;
use shared::{AppError, CalendarId, DomainError};
use sqlx::PgPool;

use crate::models::{CalendarRow, RecurringEventRow};
use crate::repositories::conversions::{row_to_calendar, row_to_recurring_event};
use crate::repositories::transaction::PgStoreTransaction;

/// Postgres-backed `Store`. Holds the pool plus the encryption and in-memory
/// caching concerns that every read/write of `refresh_token` goes through.
pub struct PostgresStore {
    pool: PgPool,
    cipher: Arc<RefreshTokenCipher>,
    cache: Arc<RefreshTokenCache>,
}

impl PostgresStore {
    pub fn new(pool: PgPool, cipher: Arc<RefreshTokenCipher>, cache: Arc<RefreshTokenCache>) -> Self {
        Self { pool, cipher, cache }
    }

    async fn resolve_refresh_token(&self, calendar_id: &CalendarId) -> StoreResult<Option<String>> {
        if let Some(cached) = self.cache.get(calendar_id) {
            return Ok(Some(cached));
        }

        let row = sqlx::query_as::<_, (Option<String>,)>(
            "SELECT refresh_token FROM calendars WHERE id = $1",
        )
        .bind(calendar_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let ciphertext = match row {
            Some((Some(ciphertext),)) => ciphertext,
            _ => return Ok(None),
        };

        let plaintext = self
            .cipher
            .decrypt(&ciphertext)
            .map_err(|e| AppError::Internal(format!("failed to decrypt refresh token: {e}")))?;
        self.cache.insert(calendar_id.clone(), plaintext.clone());
        Ok(Some(plaintext))
    }
}

#[async_trait]
impl RefreshTokenResolver for PostgresStore {
    async fn get_refresh_token(&self, calendar_id: &CalendarId) -> StoreResult<Option<String>> {
        self.resolve_refresh_token(calendar_id).await
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn with_transaction<'a, F, Fut, T>(&'a self, f: F) -> StoreResult<T>
    where
        F: FnOnce(Box<dyn StoreTransaction + 'a>) -> Fut + Send + 'a,
        Fut: std::future::Future<Output = StoreResult<T>> + Send + 'a,
        T: Send + 'a,
    {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let inner = PgStoreTransaction::new(&mut tx, &self.cipher, &self.cache);
        let result = AssertUnwindSafe(f(Box::new(inner))).catch_unwind().await;

        match result {
            Ok(Ok(value)) => {
                tx.commit().await.map_err(AppError::from)?;
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed after transaction error");
                }
                Err(err)
            }
            Err(panic) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed after transaction panic");
                }
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "transaction closure panicked".to_string());
                tracing::error!(panic = %message, "panic inside store transaction, rolled back");
                Err(AppError::Internal(format!(
                    "transaction aborted by panic: {message}"
                )))
            }
        }
    }

    async fn get_calendar(&self, calendar_id: &CalendarId) -> StoreResult<Option<Calendar>> {
        let row = sqlx::query_as::<_, CalendarRow>(
            "SELECT id, name, refresh_token FROM calendars WHERE id = $1",
        )
        .bind(calendar_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let token = self.resolve_refresh_token(calendar_id).await?;
        Ok(Some(row_to_calendar(row, token)))
    }

    async fn list_calendars(&self) -> StoreResult<Vec<Calendar>> {
        let rows = sqlx::query_as::<_, CalendarRow>("SELECT id, name, refresh_token FROM calendars ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut calendars = Vec::with_capacity(rows.len());
        for row in rows {
            let token = self.resolve_refresh_token(&row.id).await?;
            calendars.push(row_to_calendar(row, token));
        }
        Ok(calendars)
    }

    async fn get_refresh_token(&self, calendar_id: &CalendarId) -> StoreResult<Option<String>> {
        self.resolve_refresh_token(calendar_id).await
    }

    async fn get_latest_sync_token(&self, calendar_id: &CalendarId) -> StoreResult<String> {
        let row = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT next_sync_token
            FROM sync_histories
            WHERE calendar_id = $1
            ORDER BY sync_time DESC
            LIMIT 1
            "#,
        )
        .bind(calendar_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((token,)) => Ok(token),
            None => Ok(String::new()),
        }
    }

    async fn list_active_recurring_events_with_after(
        &self,
        calendar_id: &CalendarId,
        after: chrono::DateTime<chrono::Utc>,
    ) -> StoreResult<Vec<RecurringEvent>> {
        let rows = sqlx::query_as::<_, RecurringEventRow>(
            r#"
            SELECT calendar_id, id, summary, recurrence, start, "end", status
            FROM recurring_events
            WHERE calendar_id = $1
              AND status != 'cancelled'
              AND (start IS NULL OR start >= $2 OR "end" IS NULL OR "end" >= $2)
            ORDER BY id
            "#,
        )
        .bind(calendar_id.as_str())
        .bind(after)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_recurring_event).collect()
    }

    async fn list_active_recurring_events_by_ids(
        &self,
        calendar_id: &CalendarId,
        ids: &[shared::EventId],
    ) -> StoreResult<Vec<RecurringEvent>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let id_strings: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();

        let rows = sqlx::query_as::<_, RecurringEventRow>(
            r#"
            SELECT calendar_id, id, summary, recurrence, start, "end", status
            FROM recurring_events
            WHERE calendar_id = $1
              AND status != 'cancelled'
              AND id = ANY($2)
            ORDER BY id
            "#,
        )
        .bind(calendar_id.as_str())
        .bind(&id_strings)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_recurring_event).collect()
    }
}

/// `create_calendar` lives on the transaction contract, not `Store`, since
/// §4.1 requires it to run inside the same transaction a caller might use to
/// seed the first sync. `CreateCalendar`'s one-shot convenience path just
/// opens its own transaction.
pub(crate) fn unique_violation(err: &sqlx::Error) -> bool {
    matches!(err.as_database_error().and_then(|e| e.code()), Some(code) if code == "23505")
}

pub(crate) fn map_create_calendar_error(err: sqlx::Error) -> AppError {
    if unique_violation(&err) {
        AppError::Domain(DomainError::CalendarAlreadyExists)
    } else {
        AppError::from(err)
    }
}

pub(crate) fn encrypt_refresh_token(
    cipher: &RefreshTokenCipher,
    new_calendar: &NewCalendar,
) -> StoreResult<Option<String>> {
    match &new_calendar.refresh_token {
        Some(plaintext) => {
            let ciphertext = cipher
                .encrypt(plaintext)
                .map_err(|e| AppError::Internal(format!("failed to encrypt refresh token: {e}")))?;
            Ok(Some(ciphertext))
        }
        None => Ok(None),
    }
}
