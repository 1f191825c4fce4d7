//! # xAPI Transport
//!
//! JSON request/response protocol of the xAPI brokerage server, carried over
//! a TLS socket.
//!
//! ## Framing
//!
//! ```text
//! request:  {"command": "getSymbol", "arguments": {"symbol": "GOLD"}}
//! response: {"status": true, "returnData": {...}}\n\n
//! error:    {"status": false, "errorCode": "BE005", "errorDescr": "..."}\n\n
//! ```
//!
//! Responses are terminated by an empty line. The server drops clients that
//! send faster than one command per 200ms, so commands are paced.
//!
//! ## Endpoints
//!
//! | Account | Port |
//! |---------|------|
//! | real    | 5112 |
//! | demo    | 5124 |

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_native_tls::{TlsConnector, TlsStream};
use tracing::debug;

use super::api::{Endpoint, MarketApi};
use crate::error::ApiError;

/// Minimum gap between two commands
const COMMAND_SPACING: Duration = Duration::from_millis(200);

/// Upper bound for one response (the full symbol list is a few MB)
const MAX_RESPONSE_BYTES: usize = 32 * 1024 * 1024;

/// Command name that authenticates the connection
pub const LOGIN_COMMAND: &str = "login";

/// # xAPI Client
///
/// A single request/response connection. Not safe for concurrent use; the
/// scheduler issues one command at a time.
#[derive(Default)]
pub struct XapiClient {
    stream: Option<BufReader<TlsStream<TcpStream>>>,
    last_command: Option<Instant>,
}

impl XapiClient {
    pub fn new() -> Self {
        Self::default()
    }

    async fn pace(&self) {
        if let Some(last) = self.last_command {
            let next = last + COMMAND_SPACING;
            if next > Instant::now() {
                tokio::time::sleep_until(next).await;
            }
        }
    }
}

#[async_trait]
impl MarketApi for XapiClient {
    async fn open(&mut self, endpoint: &Endpoint) -> Result<(), ApiError> {
        self.close().await;

        let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|e| ApiError::Unreachable(format!("{}: {}", endpoint, e)))?;

        let connector = native_tls::TlsConnector::new()
            .map_err(|e| ApiError::Unreachable(format!("TLS setup failed: {}", e)))?;
        let tls = TlsConnector::from(connector)
            .connect(&endpoint.host, tcp)
            .await
            .map_err(|e| ApiError::Unreachable(format!("TLS handshake with {} failed: {}", endpoint, e)))?;

        debug!(%endpoint, "market connection open");
        self.stream = Some(BufReader::new(tls));
        Ok(())
    }

    async fn execute(&mut self, command: &str, arguments: Option<Value>) -> Result<Value, ApiError> {
        self.pace().await;
        let result = exchange(&mut self.stream, command, arguments).await;
        self.last_command = Some(Instant::now());
        result
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.get_mut().write_all(&encode_request("logout", None)).await;
            let _ = stream.get_mut().shutdown().await;
            debug!("market connection closed");
        }
    }
}

// ============================================================================
// FRAMING
// ============================================================================

/// Send one command over the connection in `slot` and read its answer.
///
/// The connection is out of `slot` while the exchange is in flight and goes
/// back only after a whole response was read. An exchange that is dropped
/// midway or fails on the socket leaves `slot` empty, so later commands get
/// [`ApiError::Unreachable`] instead of somebody else's answer.
pub async fn exchange<S>(
    slot: &mut Option<BufReader<S>>,
    command: &str,
    arguments: Option<Value>,
) -> Result<Value, ApiError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = slot
        .take()
        .ok_or_else(|| ApiError::Unreachable("not connected".to_string()))?;

    let request = encode_request(command, arguments);
    let io_err = |e: std::io::Error| ApiError::Unreachable(format!("{}: {}", command, e));
    stream.get_mut().write_all(&request).await.map_err(io_err)?;
    stream.get_mut().flush().await.map_err(io_err)?;

    let response = read_response(&mut stream).await?;
    *slot = Some(stream);
    decode_response(command, &response)
}

/// Serialize one command.
pub fn encode_request(command: &str, arguments: Option<Value>) -> Vec<u8> {
    let request = match arguments {
        Some(arguments) => json!({ "command": command, "arguments": arguments }),
        None => json!({ "command": command }),
    };
    request.to_string().into_bytes()
}

/// Read one blank-line terminated response, without the terminator.
pub async fn read_response<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ApiError> {
    let mut buf = Vec::new();
    loop {
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| ApiError::Unreachable(format!("read failed: {}", e)))?;
        if n == 0 {
            return Err(ApiError::Unreachable("connection closed by server".to_string()));
        }
        if buf.ends_with(b"\n\n") {
            buf.truncate(buf.len() - 2);
            return Ok(buf);
        }
        if buf.len() > MAX_RESPONSE_BYTES {
            return Err(ApiError::MalformedPayload("response too large".to_string()));
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    status: bool,
    #[serde(rename = "returnData")]
    return_data: Option<Value>,
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
    #[serde(rename = "errorDescr")]
    error_descr: Option<String>,
}

/// Unwrap the status envelope of a response.
pub fn decode_response(command: &str, bytes: &[u8]) -> Result<Value, ApiError> {
    let envelope: Envelope = serde_json::from_slice(bytes)
        .map_err(|e| ApiError::MalformedPayload(format!("{}: {}", command, e)))?;

    if envelope.status {
        return Ok(envelope.return_data.unwrap_or(Value::Null));
    }

    let detail = format!(
        "{} refused: {} {}",
        command,
        envelope.error_code.as_deref().unwrap_or("?"),
        envelope.error_descr.as_deref().unwrap_or("")
    )
    .trim_end()
    .to_string();

    if command == LOGIN_COMMAND {
        Err(ApiError::AuthRejected(detail))
    } else {
        Err(ApiError::MalformedPayload(detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_encode_without_arguments() {
        let bytes = encode_request("ping", None);
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({"command": "ping"}));
    }

    #[test]
    fn test_encode_with_arguments() {
        let bytes = encode_request("getSymbol", Some(json!({"symbol": "GOLD"})));
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["arguments"]["symbol"], "GOLD");
    }

    #[test]
    fn test_decode_success() {
        let payload = decode_response("getServerTime", br#"{"status":true,"returnData":{"time":1}}"#).unwrap();
        assert_eq!(payload["time"], 1);
    }

    #[test]
    fn test_decode_success_without_payload() {
        assert_eq!(decode_response("ping", br#"{"status":true}"#).unwrap(), Value::Null);
    }

    #[test]
    fn test_decode_login_refused() {
        let err = decode_response(
            "login",
            br#"{"status":false,"errorCode":"BE005","errorDescr":"userPasswordCheck: Invalid login or password"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::AuthRejected(ref msg) if msg.contains("BE005")));
    }

    #[test]
    fn test_decode_command_refused() {
        let err = decode_response("getTickPrices", br#"{"status":false,"errorCode":"BE004"}"#).unwrap_err();
        assert!(matches!(err, ApiError::MalformedPayload(_)));
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_response("ping", b"<html>").unwrap_err();
        assert!(matches!(err, ApiError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn test_read_response_splits_on_blank_line() {
        let mut input: &[u8] = b"{\"status\":true}\n\n{\"status\":false}\n\n";
        let first = read_response(&mut input).await.unwrap();
        assert_eq!(first, b"{\"status\":true}");
        let second = read_response(&mut input).await.unwrap();
        assert_eq!(second, b"{\"status\":false}");
        assert!(matches!(
            read_response(&mut input).await,
            Err(ApiError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_read_response_keeps_single_newlines() {
        let mut input: &[u8] = b"{\"status\":\ntrue}\n\n";
        let body = read_response(&mut input).await.unwrap();
        assert_eq!(body, b"{\"status\":\ntrue}");
    }

    #[tokio::test]
    async fn test_exchange_keeps_answered_connection() {
        let (client, mut server) = tokio::io::duplex(4096);
        server
            .write_all(b"{\"status\":true,\"returnData\":{\"categoryName\":\"STC\"}}\n\n")
            .await
            .unwrap();
        let mut slot = Some(BufReader::new(client));

        let payload = exchange(&mut slot, "getSymbol", Some(json!({"symbol": "AAA"})))
            .await
            .unwrap();
        assert_eq!(payload["categoryName"], "STC");
        assert!(slot.is_some());

        let mut request = vec![0u8; 256];
        let n = server.read(&mut request).await.unwrap();
        let sent: Value = serde_json::from_slice(&request[..n]).unwrap();
        assert_eq!(sent["command"], "getSymbol");
    }

    #[tokio::test]
    async fn test_exchange_keeps_connection_after_refusal() {
        let (client, mut server) = tokio::io::duplex(4096);
        server
            .write_all(b"{\"status\":false,\"errorCode\":\"BE004\"}\n\n")
            .await
            .unwrap();
        let mut slot = Some(BufReader::new(client));

        let err = exchange(&mut slot, "getSymbol", None).await.unwrap_err();
        assert!(matches!(err, ApiError::MalformedPayload(_)));
        assert!(slot.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_exchange_poisons_connection() {
        let (client, mut server) = tokio::io::duplex(4096);
        let mut slot = Some(BufReader::new(client));

        let abandoned = tokio::time::timeout(
            Duration::from_secs(1),
            exchange(&mut slot, "getChartRangeRequest", None),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(slot.is_none());

        // the late chart answer must not be read as the next command's reply
        server
            .write_all(b"{\"status\":true,\"returnData\":{\"digits\":2,\"rateInfos\":[]}}\n\n")
            .await
            .unwrap();
        let next = exchange(&mut slot, "getSymbol", None).await;
        assert!(matches!(next, Err(ApiError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_closed_socket_poisons_connection() {
        let (client, server) = tokio::io::duplex(4096);
        drop(server);
        let mut slot = Some(BufReader::new(client));

        let err = exchange(&mut slot, "ping", None).await.unwrap_err();
        assert!(matches!(err, ApiError::Unreachable(_)));
        assert!(slot.is_none());
    }
}
