//! Error types for Mailfleet

use thiserror::Error;

/// Main error type for Mailfleet
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Account unavailable: {0}")]
    AccountUnavailable(String),

    #[error("Daily send quota exhausted")]
    QuotaExhausted,

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Mailfleet
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Config(_) => 500,
            Error::Database(_) => 500,
            Error::Validation(_) => 422,
            Error::NotFound(_) => 404,
            Error::AccountUnavailable(_) => 409,
            Error::QuotaExhausted => 429,
            Error::Smtp(_) => 500,
            Error::InvalidTransition(_) => 409,
            Error::Internal(_) => 500,
            Error::Other(_) => 500,
        }
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::AccountUnavailable(_) => "ACCOUNT_UNAVAILABLE",
            Error::QuotaExhausted => "QUOTA_EXHAUSTED",
            Error::Smtp(_) => "SMTP_ERROR",
            Error::InvalidTransition(_) => "INVALID_TRANSITION",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::QuotaExhausted.code(), "QUOTA_EXHAUSTED");
        assert_eq!(Error::QuotaExhausted.status_code(), 429);
        assert_eq!(Error::NotFound("campaign".into()).status_code(), 404);
        assert_eq!(
            Error::AccountUnavailable("deleted".into()).code(),
            "ACCOUNT_UNAVAILABLE"
        );
    }
}
