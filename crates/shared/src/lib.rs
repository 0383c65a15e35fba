pub mod config;
pub mod errors;
pub mod types;

pub use config::{AppConfig, ConfigError, DatabaseBackend, OAuthConfig};
pub use errors::{AppError, DomainError};
pub use types::*;
