//! The request/response seam between [`MarketSession`](super::MarketSession)
//! and a concrete wire.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ApiError;

/// Network location of the market server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A command channel to the market server.
///
/// Implementations map every transport or protocol failure onto
/// [`ApiError`]; a `login` refused by the server must come back as
/// [`ApiError::AuthRejected`].
#[async_trait]
pub trait MarketApi: Send {
    /// Open the underlying connection.
    async fn open(&mut self, endpoint: &Endpoint) -> Result<(), ApiError>;

    /// Run one command and return its payload (`Value::Null` when the
    /// command carries none).
    async fn execute(&mut self, command: &str, arguments: Option<Value>) -> Result<Value, ApiError>;

    /// Close the connection. Best-effort, safe to call repeatedly.
    async fn close(&mut self);
}
