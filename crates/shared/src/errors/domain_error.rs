use thiserror::Error;

/// Client-facing errors: every variant maps to an HTTP-style status code and
/// a message that is safe to render verbatim to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("calendar not found")]
    CalendarNotFound,

    #[error("calendar already exists")]
    CalendarAlreadyExists,

    #[error("invalid json")]
    InvalidJson,

    #[error("{0} is required")]
    Required(String),

    #[error("{0} is not allowed")]
    NotAllowed(String),

    #[error("all must be true")]
    AllParameterFalse,
}

impl DomainError {
    pub fn status_code(&self) -> u16 {
        match self {
            DomainError::CalendarNotFound => 404,
            DomainError::CalendarAlreadyExists => 409,
            DomainError::InvalidJson
            | DomainError::Required(_)
            | DomainError::NotAllowed(_)
            | DomainError::AllParameterFalse => 400,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DomainError::CalendarNotFound => "CALENDAR_NOT_FOUND",
            DomainError::CalendarAlreadyExists => "CALENDAR_ALREADY_EXISTS",
            DomainError::InvalidJson => "INVALID_JSON",
            DomainError::Required(_) => "REQUIRED",
            DomainError::NotAllowed(_) => "NOT_ALLOWED",
            DomainError::AllParameterFalse => "ALL_PARAMETER_FALSE",
        }
    }
}
