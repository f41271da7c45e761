//! Error types for tally.

use thiserror::Error;

/// Result type alias using tally's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// PostgreSQL SQLSTATE for `undefined_table`.
pub const PG_UNDEFINED_TABLE: &str = "42P01";

/// Core error type for tally operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invoice not found
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(uuid::Uuid),

    /// Client not found
    #[error("Client not found: {0}")]
    ClientNotFound(uuid::Uuid),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Status change not allowed from the current state
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Subscription plan limit reached
    #[error("Plan limit exceeded: {0}")]
    LimitExceeded(String),

    /// External provider (email, payments) rejected or failed the call
    #[error("Provider error: {0}")]
    Provider(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Job queue error
    #[error("Job error: {0}")]
    Job(String),

    /// Authentication/authorization failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the underlying database error is "relation does not exist".
    ///
    /// The purge flow treats this as non-fatal so that partially migrated
    /// databases can still be cleaned up.
    pub fn is_undefined_table(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().as_deref() == Some(PG_UNDEFINED_TABLE)
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_invoice_not_found() {
        let id = Uuid::nil();
        let err = Error::InvoiceNotFound(id);
        assert_eq!(err.to_string(), format!("Invoice not found: {}", id));
    }

    #[test]
    fn test_error_display_client_not_found() {
        let id = Uuid::new_v4();
        let err = Error::ClientNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_error_display_limit_exceeded() {
        let err = Error::LimitExceeded("5 invoices per month".to_string());
        assert_eq!(err.to_string(), "Plan limit exceeded: 5 invoices per month");
    }

    #[test]
    fn test_error_display_invalid_transition() {
        let err = Error::InvalidTransition("paid -> sent".to_string());
        assert_eq!(err.to_string(), "Invalid transition: paid -> sent");
    }

    #[test]
    fn test_error_display_provider() {
        let err = Error::Provider("email rejected".to_string());
        assert_eq!(err.to_string(), "Provider error: email rejected");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_non_database_error_is_not_undefined_table() {
        assert!(!Error::NotFound("x".into()).is_undefined_table());
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_undefined_table());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
