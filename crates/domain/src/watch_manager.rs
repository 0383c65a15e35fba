use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use shared::{AppError, CalendarId, ChannelId, DomainError};

use crate::calendar_client::CalendarClient;
use crate::clock::Clock;
use crate::entities::Channel;
use crate::store::Store;

/// `ChannelID = base64(CalendarID)`, unpadded. Stable across runs so webhook
/// deliveries addressed to a channel that was just replaced can still be
/// correlated during the stop-then-start window.
pub fn derive_channel_id(calendar_id: &CalendarId) -> ChannelId {
    ChannelId::new(STANDARD_NO_PAD.encode(calendar_id.as_str()))
}

/// The webhook-channel lifecycle (§4.4). Depends on `CalendarClient` and
/// `Store`.
pub struct WatchManager<C: ?Sized, S> {
    clock: Arc<dyn Clock>,
    calendar_client: Arc<C>,
    store: Arc<S>,
}

impl<C: ?Sized, S> WatchManager<C, S>
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

    pub async fn start(&self, calendar_id: &CalendarId) -> Result<(), AppError> {
        if self.store.get_calendar(calendar_id).await?.is_none() {
            return Err(DomainError::CalendarNotFound.into());
        }

        let calendar_id = calendar_id.clone();
        let calendar_client = Arc::clone(&self.calendar_client);
        let start_time = self.clock.now();
        self.store
            .with_transaction(move |mut tx| {
                let calendar_id = calendar_id.clone();
                let calendar_client = Arc::clone(&calendar_client);
                Box::pin(async move {
                    tx.lock_calendar(&calendar_id).await?;
                    stop_active(tx.as_mut(), calendar_client.as_ref(), &calendar_id).await?;

                    let registration = calendar_client
                        .watch(&calendar_id)
                        .await
                        .map_err(|e| AppError::ExternalApi(e.to_string()))?;
                    let channel = Channel {
                        calendar_id: calendar_id.clone(),
                        resource_id: registration.resource_id,
                        start_time,
                        expiration: registration.expiration,
                        is_stopped: false,
                    };
                    tx.create_channel_history(channel).await?;
                    Ok(())
                })
            })
            .await
    }

    pub async fn stop(&self, calendar_id: &CalendarId) -> Result<(), AppError> {
        if self.store.get_calendar(calendar_id).await?.is_none() {
            return Err(DomainError::CalendarNotFound.into());
        }

        let calendar_id = calendar_id.clone();
        let calendar_client = Arc::clone(&self.calendar_client);
        self.store
            .with_transaction(move |mut tx| {
                let calendar_id = calendar_id.clone();
                let calendar_client = Arc::clone(&calendar_client);
                Box::pin(async move {
                    tx.lock_calendar(&calendar_id).await?;
                    stop_active(tx.as_mut(), calendar_client.as_ref(), &calendar_id).await
                })
            })
            .await
    }

    pub async fn start_all(&self) -> Result<(), AppError> {
        let calendars = self.store.list_calendars().await?;
        for calendar in calendars {
            self.start(&calendar.id).await.map_err(|e| {
                AppError::Internal(format!(
                    "fail to start watch for calendar {}: {e}",
                    calendar.id
                ))
            })?;
        }
        Ok(())
    }
}

/// Stops any currently active channel for this calendar, within the
/// caller's transaction. Accepted trade-off: if the provider-side stop
/// succeeds but the DB update fails and the transaction rolls back, the
/// provider-side channel simply expires on its own; this is not treated as
/// a bug.
async fn stop_active<C: CalendarClient + ?Sized>(
    tx: &mut (dyn crate::store::StoreTransaction + '_),
    calendar_client: &C,
    calendar_id: &CalendarId,
) -> Result<(), AppError> {
    let active = tx.list_active_channels_with_lock(calendar_id).await?;
    for channel in &active {
        calendar_client
            .stop_watch(channel)
            .await
            .map_err(|e| AppError::ExternalApi(e.to_string()))?;
    }
    if !active.is_empty() {
        tx.stop_active_channels(calendar_id).await?;
    }
    Ok(())
}
