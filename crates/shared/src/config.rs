use std::env;

/// How the database connection pool is dialed.
///
/// Bootstrapping the connection itself (and running migrations) is an
/// external collaborator per this crate's scope; this only carries the
/// parameters the bootstrapper needs.
#[derive(Debug, Clone)]
pub enum DatabaseBackend {
    /// Plain `postgres://` connection string, dialed directly over TCP.
    DirectTcp { database_url: String },
    /// A managed cloud SQL instance reached through a connector that
    /// registers its own dialer (e.g. Cloud SQL Auth Proxy) instead of a
    /// bare host:port.
    CloudConnector {
        instance_connection_name: String,
        user: String,
        password: String,
        database_name: String,
        use_private_ip: bool,
    },
}

/// OAuth application credentials, present only in OAuth deployment mode.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

/// Process-wide configuration, assembled once at startup from the
/// environment (`dotenvy::dotenv()` is expected to have already run).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseBackend,
    pub webhook_base_url: String,
    pub oauth: Option<OAuthConfig>,
    /// 32-byte symmetric key used by the refresh-token cipher, present only
    /// in OAuth mode.
    pub encryption_key: Option<[u8; 32]>,
    pub clock_timezone: String,
    pub log_level: String,
    pub listen_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database = if let Ok(instance) = env::var("CLOUDSQL_INSTANCE_CONNECTION_NAME") {
            DatabaseBackend::CloudConnector {
                instance_connection_name: instance,
                user: env::var("DATABASE_USER")
                    .map_err(|_| ConfigError::Missing("DATABASE_USER"))?,
                password: env::var("DATABASE_PASSWORD")
                    .map_err(|_| ConfigError::Missing("DATABASE_PASSWORD"))?,
                database_name: env::var("DATABASE_NAME")
                    .map_err(|_| ConfigError::Missing("DATABASE_NAME"))?,
                use_private_ip: env::var("CLOUDSQL_USE_PRIVATE_IP").is_ok(),
            }
        } else {
            DatabaseBackend::DirectTcp {
                database_url: env::var("DATABASE_URL")
                    .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            }
        };

        let webhook_base_url = env::var("WEBHOOK_BASE_URL")
            .map_err(|_| ConfigError::Missing("WEBHOOK_BASE_URL"))?;

        let oauth = match (
            env::var("OAUTH_CLIENT_ID").ok(),
            env::var("OAUTH_CLIENT_SECRET").ok(),
            env::var("OAUTH_REDIRECT_URL").ok(),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_url)) => Some(OAuthConfig {
                client_id,
                client_secret,
                redirect_url,
            }),
            (None, None, None) => None,
            _ => return Err(ConfigError::IncompleteOAuth),
        };

        let encryption_key = match env::var("ENCRYPTION_KEY") {
            Ok(raw) => Some(parse_encryption_key(&raw)?),
            Err(_) => None,
        };

        if oauth.is_some() && encryption_key.is_none() {
            return Err(ConfigError::Missing("ENCRYPTION_KEY"));
        }

        Ok(Self {
            database,
            webhook_base_url,
            oauth,
            encryption_key,
            clock_timezone: env::var("CLOCK_TIMEZONE").unwrap_or_else(|_| "UTC".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            listen_port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
        })
    }

    pub fn is_oauth_mode(&self) -> bool {
        self.oauth.is_some()
    }
}

fn parse_encryption_key(raw: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = raw.as_bytes();
    if bytes.len() != 32 {
        return Err(ConfigError::InvalidKeyLength(bytes.len()));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(bytes);
    Ok(key)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("OAUTH_CLIENT_ID, OAUTH_CLIENT_SECRET and OAUTH_REDIRECT_URL must be set together")]
    IncompleteOAuth,
    #[error("ENCRYPTION_KEY must be exactly 32 bytes, got {0}")]
    InvalidKeyLength(usize),
}
