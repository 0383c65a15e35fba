use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration as StdDuration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use domain::calendar_client::drain_pages;
use domain::store::RefreshTokenResolver;
use domain::{
    CalendarClient, CalendarClientError, CalendarClientResult, EventListing, WatchRegistration,
};
use domain::{Channel, Event};
use shared::{CalendarId, EventId, ResourceId};

use super::base::{self, ListCursor};

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
/// Shave a margin off the provider's reported TTL so a token is never used
/// right up to the instant it expires.
const EXPIRY_MARGIN: StdDuration = StdDuration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// `CalendarClient` for the per-calendar OAuth-refresh-token deployment
/// mode. Each mirrored calendar authenticates with its own refresh token,
/// resolved through the `RefreshTokenResolver` the `Store` implements. This
/// breaks the Store<->CalendarClient reference cycle: the client depends on
/// the narrow resolver interface, not the concrete Store.
pub struct OAuthCalendarClient {
    http: Client,
    client_id: String,
    client_secret: String,
    resolver: Arc<dyn RefreshTokenResolver>,
    webhook_base_url: String,
    access_tokens: RwLock<HashMap<CalendarId, (String, Instant)>>,
}

impl OAuthCalendarClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        resolver: Arc<dyn RefreshTokenResolver>,
        webhook_base_url: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            resolver,
            webhook_base_url: webhook_base_url.into(),
            access_tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Returns a live access token for `calendar_id`, refreshing it against
    /// the token endpoint if the cached one is missing or expired.
    async fn access_token(&self, calendar_id: &CalendarId) -> CalendarClientResult<String> {
        if let Some(token) = self.cached_token(calendar_id) {
            return Ok(token);
        }

        let refresh_token = self
            .resolver
            .get_refresh_token(calendar_id)
            .await
            .map_err(|e| CalendarClientError::Request(e.to_string()))?
            .ok_or_else(|| {
                CalendarClientError::Request(format!(
                    "no refresh token stored for calendar {calendar_id}"
                ))
            })?;

        let response = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .timeout(base::REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| CalendarClientError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CalendarClientError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(CalendarClientError::Request(format!(
                "fail to refresh access token: HTTP {status}: {body}"
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| CalendarClientError::Request(format!("fail to parse token response: {e}")))?;

        let expires_at =
            Instant::now() + StdDuration::from_secs(parsed.expires_in).saturating_sub(EXPIRY_MARGIN);
        self.access_tokens
            .write()
            .unwrap()
            .insert(calendar_id.clone(), (parsed.access_token.clone(), expires_at));

        Ok(parsed.access_token)
    }

    fn cached_token(&self, calendar_id: &CalendarId) -> Option<String> {
        let tokens = self.access_tokens.read().unwrap();
        let (token, expires_at) = tokens.get(calendar_id)?;
        if Instant::now() < *expires_at {
            Some(token.clone())
        } else {
            None
        }
    }
}

#[async_trait]
impl CalendarClient for OAuthCalendarClient {
    async fn list_events_since(
        &self,
        calendar_id: &CalendarId,
        after: DateTime<Utc>,
    ) -> CalendarClientResult<EventListing> {
        let token = self.access_token(calendar_id).await?;
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
        let token = self.access_token(calendar_id).await?;
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
        let token = self.access_token(calendar_id).await?;
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
        let token = self.access_token(calendar_id).await?;
        let channel_id = domain::derive_channel_id(calendar_id);
        let response = base::watch(
            &self.http,
            &token,
            calendar_id,
            channel_id.as_str(),
            &self.webhook_base_url,
        )
        .await?;
        super::shared_client::to_registration(response)
    }

    async fn stop_watch(&self, channel: &Channel) -> CalendarClientResult<()> {
        if channel.is_stopped {
            return Ok(());
        }
        let token = self.access_token(&channel.calendar_id).await?;
        let channel_id = domain::derive_channel_id(&channel.calendar_id);
        base::stop_watch(
            &self.http,
            &token,
            channel_id.as_str(),
            channel.resource_id.as_str(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait as async_trait_alias;

    struct StubResolver(Option<String>);

    #[async_trait_alias]
    impl RefreshTokenResolver for StubResolver {
        async fn get_refresh_token(
            &self,
            _calendar_id: &CalendarId,
        ) -> domain::store::StoreResult<Option<String>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn missing_refresh_token_surfaces_as_request_error() {
        let client = OAuthCalendarClient::new(
            "client-id",
            "client-secret",
            Arc::new(StubResolver(None)),
            "https://example.test/webhook",
        );
        let err = client
            .access_token(&CalendarId::new("cal-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CalendarClientError::Request(_)));
    }
}
