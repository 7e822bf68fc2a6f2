// Domain error types - no internal detail reaches response bodies

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    /// Login failed (HTTP 401) - wrong email and wrong password are indistinguishable
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing or invalid bearer token (HTTP 401)
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Host header not in the trusted set (HTTP 400)
    #[error("Untrusted host")]
    UntrustedHost,

    /// Malformed request body or field (HTTP 422)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration error (HTTP 500)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Database error (HTTP 500)
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Password hashing or verification failure (HTTP 500)
    #[error("Hashing error: {0}")]
    HashingError(String),
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::InvalidCredentials => 401,
            AppError::Unauthenticated => 401,
            AppError::UntrustedHost => 400,
            AppError::ValidationError(_) => 422,
            AppError::ConfigurationError(_) => 500,
            AppError::DatabaseError(_) => 500,
            AppError::HashingError(_) => 500,
        }
    }

    /// Get user-facing error message (no sensitive information)
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidCredentials => "Invalid credentials".to_string(),
            AppError::Unauthenticated => "Unauthenticated".to_string(),
            AppError::UntrustedHost => "Untrusted host".to_string(),
            AppError::ValidationError(reason) => format!("Validation error: {}", reason),
            AppError::ConfigurationError(_) => "Internal error".to_string(),
            AppError::DatabaseError(_) => "Internal error".to_string(),
            AppError::HashingError(_) => "Internal error".to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::InvalidCredentials.status_code(), 401);
        assert_eq!(AppError::Unauthenticated.status_code(), 401);
        assert_eq!(AppError::UntrustedHost.status_code(), 400);
        assert_eq!(AppError::ValidationError("bad email".to_string()).status_code(), 422);
        assert_eq!(AppError::DatabaseError("pool closed".to_string()).status_code(), 500);
    }

    #[test]
    fn test_user_messages_no_sensitive_data() {
        let err = AppError::DatabaseError("connection to db.internal:5432 refused".to_string());
        let user_msg = err.user_message();

        // Should not contain host names or connection detail
        assert!(!user_msg.contains("db.internal"));
        assert_eq!(user_msg, "Internal error");
    }

    #[test]
    fn test_validation_message_preserved() {
        let err = AppError::ValidationError("email must not be empty".to_string());
        assert!(err.user_message().contains("email must not be empty"));
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        match err {
            AppError::DatabaseError(_) => (),
            _ => panic!("Expected AppError::DatabaseError"),
        }
    }
}
