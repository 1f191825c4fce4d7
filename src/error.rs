//! # Error Types
//!
//! This module defines error types used throughout the cat-ticker library.
//!
//! Two layers exist:
//!
//! - [`ApiError`]: the closed set of ways a market-data request can fail.
//! - [`TickerError`]: the crate-wide error, one variant per failure class the
//!   scheduler distinguishes (auth, connect, data, ping, print).

use thiserror::Error;

/// Failure of a single market-data request.
///
/// The scheduler treats every variant as fatal mid-run; the split only
/// matters for startup diagnostics and logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Transport failed: connect refused, TLS error, socket closed.
    #[error("server unreachable: {0}")]
    Unreachable(String),

    /// The server refused the credentials.
    #[error("login rejected: {0}")]
    AuthRejected(String),

    /// The response was not what the command promises (bad JSON, missing
    /// fields, `status: false`).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Main error type for cat-ticker operations
#[derive(Debug, Error)]
pub enum TickerError {
    /// Credentials rejected at login
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Session endpoint unreachable (market server or printer)
    #[error("Connection error: {0}")]
    Connect(String),

    /// Invalid or missing market data
    #[error("Data error: {0}")]
    Data(String),

    /// Keep-alive not acknowledged
    #[error("Ping failed: {0}")]
    Ping(String),

    /// Printer rejected or dropped a job
    #[error("Print error: {0}")]
    Print(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Report could not be rendered or saved
    #[error("Render error: {0}")]
    Render(String),

    /// An external call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ApiError> for TickerError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unreachable(msg) => TickerError::Connect(msg),
            ApiError::AuthRejected(msg) => TickerError::Auth(msg),
            ApiError::MalformedPayload(msg) => TickerError::Data(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_mapping() {
        assert!(matches!(
            TickerError::from(ApiError::Unreachable("x".into())),
            TickerError::Connect(_)
        ));
        assert!(matches!(
            TickerError::from(ApiError::AuthRejected("x".into())),
            TickerError::Auth(_)
        ));
        assert!(matches!(
            TickerError::from(ApiError::MalformedPayload("x".into())),
            TickerError::Data(_)
        ));
    }

    #[test]
    fn test_display_keeps_detail() {
        let err = TickerError::from(ApiError::MalformedPayload("no quotations".into()));
        assert_eq!(err.to_string(), "Data error: no quotations");
    }
}
