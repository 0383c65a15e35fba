use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{CalendarId, EventId, ResourceId};
use thiserror::Error;

use crate::entities::{Channel, Event, RecurringEvent};

#[derive(Debug, Error)]
pub enum CalendarClientError {
    /// The presented sync token was rejected by the provider (HTTP 410, or
    /// an equivalent provider-specific reason string). The caller falls
    /// back to a full listing.
    #[error("sync token is old")]
    SyncTokenStale,

    /// A page carried neither `nextPageToken` nor `nextSyncToken`, or both.
    #[error("provider contract violation: {0}")]
    ContractViolation(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("provider request failed: {0}")]
    Request(String),
}

pub type CalendarClientResult<T> = Result<T, CalendarClientError>;

/// One finite page of a listing call.
#[derive(Debug, Clone)]
pub struct EventPage {
    pub events: Vec<Event>,
    pub recurring_events: Vec<RecurringEvent>,
    /// Set when another page follows.
    pub next_page_token: Option<String>,
    /// Set only on the final page.
    pub next_sync_token: Option<String>,
}

/// Concatenated result of draining a page sequence to its final page.
#[derive(Debug, Clone, Default)]
pub struct EventListing {
    pub events: Vec<Event>,
    pub recurring_events: Vec<RecurringEvent>,
    pub next_sync_token: String,
}

/// Provider-assigned handle for a newly registered watch channel.
/// `start_time`/`is_stopped` are assigned by the caller (`WatchManager`)
/// from its own clock, not by the provider.
#[derive(Debug, Clone)]
pub struct WatchRegistration {
    pub resource_id: ResourceId,
    pub expiration: DateTime<Utc>,
}

/// The provider-facing interface. Polymorphic over two deployment modes: a
/// single shared client and a per-calendar OAuth-refresh-token client.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// Pages internally until a page reports a non-empty `next_sync_token`;
    /// returns both lists concatenated. `show_deleted=true` so cancellations
    /// appear.
    async fn list_events_since(
        &self,
        calendar_id: &CalendarId,
        after: DateTime<Utc>,
    ) -> CalendarClientResult<EventListing>;

    /// Same pagination contract as `list_events_since`. Fails with
    /// `CalendarClientError::SyncTokenStale` if the provider signals the
    /// token is no longer valid.
    async fn list_events_with_token(
        &self,
        calendar_id: &CalendarId,
        sync_token: &str,
    ) -> CalendarClientResult<EventListing>;

    /// `show_deleted=false`; cancellations within the window are handled by
    /// the reconciliation rules, not by the provider.
    async fn list_instances_between(
        &self,
        calendar_id: &CalendarId,
        recurring_event_id: &EventId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CalendarClientResult<Vec<Event>>;

    /// Registers a webhook endpoint with the deterministic channel id
    /// derived from `calendar_id`. Returns only what the provider assigns;
    /// `start_time` is stamped by the caller from its own clock.
    async fn watch(&self, calendar_id: &CalendarId) -> CalendarClientResult<WatchRegistration>;

    /// Idempotent with respect to `is_stopped`.
    async fn stop_watch(&self, channel: &Channel) -> CalendarClientResult<()>;
}

/// Drains a page sequence produced by a listing call into one concatenated
/// `EventListing`, enforcing the pagination contract (§4.3.5): a response
/// carries either `next_page_token` or `next_sync_token`, never both empty,
/// never both set.
pub async fn drain_pages<F, Fut>(mut fetch_page: F) -> CalendarClientResult<EventListing>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: std::future::Future<Output = CalendarClientResult<EventPage>>,
{
    let mut listing = EventListing::default();
    let mut page_token = None;

    loop {
        let page = fetch_page(page_token.take()).await?;
        listing.events.extend(page.events);
        listing.recurring_events.extend(page.recurring_events);

        match (page.next_page_token, page.next_sync_token) {
            (Some(_), Some(_)) => {
                return Err(CalendarClientError::ContractViolation(
                    "page carried both next_page_token and next_sync_token".to_string(),
                ))
            }
            (None, None) => {
                return Err(CalendarClientError::ContractViolation(
                    "page carried neither next_page_token nor next_sync_token".to_string(),
                ))
            }
            (Some(next), None) => page_token = Some(next),
            (None, Some(sync_token)) => {
                listing.next_sync_token = sync_token;
                return Ok(listing);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_pages_concatenates_until_sync_token() {
        let pages = vec![
            EventPage {
                events: vec![],
                recurring_events: vec![],
                next_page_token: Some("p2".to_string()),
                next_sync_token: None,
            },
            EventPage {
                events: vec![],
                recurring_events: vec![],
                next_page_token: None,
                next_sync_token: Some("final".to_string()),
            },
        ];
        let mut pages = pages.into_iter();
        let listing = drain_pages(|_| {
            let page = pages.next().unwrap();
            async move { Ok(page) }
        })
        .await
        .unwrap();
        assert_eq!(listing.next_sync_token, "final");
    }

    #[tokio::test]
    async fn drain_pages_rejects_contract_violation() {
        let result = drain_pages(|_| async {
            Ok(EventPage {
                events: vec![],
                recurring_events: vec![],
                next_page_token: None,
                next_sync_token: None,
            })
        })
        .await;
        assert!(matches!(
            result,
            Err(CalendarClientError::ContractViolation(_))
        ));
    }
}
