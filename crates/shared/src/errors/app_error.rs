use super::DomainError;
use thiserror::Error;

/// Application-level errors (includes infrastructure).
///
/// `Domain` carries the small, enumerated set of client errors (§7); every
/// other variant is an unexpected error that propagates with wrapping
/// context and becomes an opaque 5xx at the boundary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("database error: {0}")]
    Database(String),

    #[error("external api error: {0}")]
    ExternalApi(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal server error: {0}")]
    Internal(String),

    #[error("request timeout")]
    Timeout,
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Domain(e) => e.status_code(),
            AppError::Database(_) | AppError::Internal(_) => 500,
            AppError::ExternalApi(_) => 502,
            AppError::NotFound(_) => 404,
            AppError::Validation(_) => 400,
            AppError::Timeout => 504,
        }
    }

    /// Get a machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Domain(e) => e.error_code(),
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::ExternalApi(_) => "EXTERNAL_API_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Timeout => "TIMEOUT",
        }
    }

    /// True if this represents an unexpected (not client-caused) error that
    /// should be logged at error level and hidden behind a generic message.
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("database error: {:?}", err);
        AppError::Database(err.to_string())
    }
}

/// Result type alias for application operations
#[allow(dead_code)]
pub type AppResult<T> = Result<T, AppError>;
