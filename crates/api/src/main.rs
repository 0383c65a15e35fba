use std::net::SocketAddr;
use std::sync::Arc;

use api::{create_app, init_metrics, AppState};
use domain::{CalendarClient, Clock, RefreshTokenCache, RefreshTokenCipher, SystemClock};
use integrations::{OAuthCalendarClient, SharedCalendarClient, StaticAccessToken};
use shared::{AppConfig, DatabaseBackend};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let metrics_handle = init_metrics();
    tracing::info!("Prometheus metrics initialized");

    let config = AppConfig::from_env().expect("invalid configuration");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("api={},tower_http=info", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = match &config.database {
        DatabaseBackend::DirectTcp { database_url } => database_url.clone(),
        DatabaseBackend::CloudConnector { .. } => {
            panic!("cloud connector dialing is infrastructure bootstrapping, not implemented here")
        }
    };

    let pool = db::create_pool(&database_url)
        .await
        .expect("failed to create database pool");

    let clock: Arc<dyn Clock> =
        Arc::new(SystemClock::new(&config.clock_timezone).expect("invalid CLOCK_TIMEZONE"));

    let cache = Arc::new(RefreshTokenCache::new());
    let oauth_mode = config.is_oauth_mode();

    let cipher = Arc::new(
        config
            .encryption_key
            .map(|key| RefreshTokenCipher::new(&key).expect("invalid ENCRYPTION_KEY"))
            .unwrap_or_else(|| {
                RefreshTokenCipher::new(&[0u8; 32]).expect("fallback cipher key is always valid")
            }),
    );

    let store = Arc::new(db::PostgresStore::new(
        pool.clone(),
        Arc::clone(&cipher),
        Arc::clone(&cache),
    ));

    let calendar_client: Arc<dyn CalendarClient> = if let Some(oauth) = &config.oauth {
        Arc::new(OAuthCalendarClient::new(
            oauth.client_id.clone(),
            oauth.client_secret.clone(),
            Arc::clone(&store),
            config.webhook_base_url.clone(),
        ))
    } else {
        let access_token =
            std::env::var("GOOGLE_ACCESS_TOKEN").expect("GOOGLE_ACCESS_TOKEN must be set in shared-client mode");
        Arc::new(SharedCalendarClient::new(
            Box::new(StaticAccessToken::new(access_token)),
            config.webhook_base_url.clone(),
        ))
    };

    let state = AppState::new(pool, store, clock, calendar_client, cache, oauth_mode, metrics_handle);

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
