use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;

use domain::calendar_client::drain_pages;
use domain::{
    CalendarClient, CalendarClientError, CalendarClientResult, EventListing, WatchRegistration,
};
use domain::{Channel, Event};
use shared::{CalendarId, EventId, ResourceId};

use super::base::{self, ListCursor};
use super::error::GoogleCalendarError;

/// `CalendarClient` for the shared-client deployment mode: one service-account
/// (or workload-identity) access token used for every mirrored calendar.
///
/// Acquiring and refreshing that token from the metadata server / service
/// account key is treated as an external collaborator; this type is handed
/// an already-valid token by its `AccessTokenSource` and only
/// re-reads it before each call so a background refresher can rotate it
/// without the client needing to know.
pub struct SharedCalendarClient {
    http: Client,
    token_source: Box<dyn AccessTokenSource>,
    webhook_base_url: String,
}

/// Narrow capability that resolves the current bearer token for the shared
/// client. A fixed-token implementation suffices for a single long-lived
/// service-account key; a workload-identity deployment would implement this
/// against the metadata server's token endpoint instead.
pub trait AccessTokenSource: Send + Sync {
    fn access_token(&self) -> String;
}

/// The simplest `AccessTokenSource`: a token that never changes for the
/// lifetime of the process.
pub struct StaticAccessToken(String);

impl StaticAccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl AccessTokenSource for StaticAccessToken {
    fn access_token(&self) -> String {
        self.0.clone()
    }
}

impl SharedCalendarClient {
    pub fn new(token_source: Box<dyn AccessTokenSource>, webhook_base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            token_source,
            webhook_base_url: webhook_base_url.into(),
        }
    }
}

#[async_trait]
impl CalendarClient for SharedCalendarClient {
    async fn list_events_since(
        &self,
        calendar_id: &CalendarId,
        after: DateTime<Utc>,
    ) -> CalendarClientResult<EventListing> {
        let token = self.token_source.access_token();
        drain_pages(|page_token| {
            let cursor = ListCursor::Since(after);
            let page_token = page_token.clone();
            async move {
                base::list_events_page(
                    &self.http,
                    &token,
                    calendar_id,
                    &cursor,
                    page_token.as_deref(),
                )
                .await
            }
        })
        .await
    }

    async fn list_events_with_token(
        &self,
        calendar_id: &CalendarId,
        sync_token: &str,
    ) -> CalendarClientResult<EventListing> {
        let token = self.token_source.access_token();
        drain_pages(|page_token| {
            let cursor = ListCursor::Token(sync_token);
            let page_token = page_token.clone();
            async move {
                base::list_events_page(
                    &self.http,
                    &token,
                    calendar_id,
                    &cursor,
                    page_token.as_deref(),
                )
                .await
            }
        })
        .await
    }

    async fn list_instances_between(
        &self,
        calendar_id: &CalendarId,
        recurring_event_id: &EventId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CalendarClientResult<Vec<Event>> {
        let token = self.token_source.access_token();
        let listing = drain_pages(|page_token| {
            let page_token = page_token.clone();
            async move {
                base::list_instances_page(
                    &self.http,
                    &token,
                    calendar_id,
                    recurring_event_id,
                    from,
                    to,
                    page_token.as_deref(),
                )
                .await
            }
        })
        .await?;
        Ok(listing.events)
    }

    async fn watch(&self, calendar_id: &CalendarId) -> CalendarClientResult<WatchRegistration> {
        let token = self.token_source.access_token();
        let channel_id = domain::derive_channel_id(calendar_id);
        let response = base::watch(
            &self.http,
            &token,
            calendar_id,
            channel_id.as_str(),
            &self.webhook_base_url,
        )
        .await?;
        to_registration(response)
    }

    async fn stop_watch(&self, channel: &Channel) -> CalendarClientResult<()> {
        if channel.is_stopped {
            return Ok(());
        }
        let token = self.token_source.access_token();
        let channel_id = domain::derive_channel_id(&channel.calendar_id);
        base::stop_watch(&self.http, &token, channel_id.as_str(), channel.resource_id.as_str()).await
    }
}

pub(super) fn to_registration(
    response: super::models::WatchResponse,
) -> CalendarClientResult<WatchRegistration> {
    let millis: i64 = response.expiration.parse().map_err(|_| {
        CalendarClientError::Request(
            GoogleCalendarError::InvalidDateTime(response.expiration.clone()).to_string(),
        )
    })?;
    let expiration = Utc
        .timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| CalendarClientError::Request("invalid expiration timestamp".to_string()))?;

    Ok(WatchRegistration {
        resource_id: ResourceId::new(response.resource_id),
        expiration,
    })
}
