use std::sync::Arc;

use domain::{CalendarClient, Clock, RefreshTokenCache, SyncEngine, WatchManager};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;

use db::PostgresStore;

/// Application state shared across all handlers.
///
/// `calendar_client` is type-erased because the deployment picks one of two
/// concrete `CalendarClient` implementations at startup (`main.rs`, based on
/// whether `AppConfig::oauth` is set); `SyncEngine`/`WatchManager` are
/// generic over the trait, not a concrete client, so a `dyn` object works
/// without an enum wrapper.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub store: Arc<PostgresStore>,
    pub sync_engine: Arc<SyncEngine<dyn CalendarClient, PostgresStore>>,
    pub watch_manager: Arc<WatchManager<dyn CalendarClient, PostgresStore>>,
    pub cache: Arc<RefreshTokenCache>,
    /// Whether the deployment requires a per-calendar refresh token on
    /// `CreateCalendar` (OAuth mode) or forbids one (shared-client mode).
    pub oauth_mode: bool,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        store: Arc<PostgresStore>,
        clock: Arc<dyn Clock>,
        calendar_client: Arc<dyn CalendarClient>,
        cache: Arc<RefreshTokenCache>,
        oauth_mode: bool,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        let sync_engine = Arc::new(SyncEngine::new(
            Arc::clone(&clock),
            Arc::clone(&calendar_client),
            Arc::clone(&store),
        ));
        let watch_manager = Arc::new(WatchManager::new(clock, calendar_client, Arc::clone(&store)));

        Self {
            pool,
            store,
            sync_engine,
            watch_manager,
            cache,
            oauth_mode,
            metrics_handle,
        }
    }
}
