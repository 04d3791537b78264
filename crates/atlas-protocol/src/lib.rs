//! Atlas wire protocol.
//!
//! JSON-RPC 2.0 style request/response/notification envelopes, newline
//! delimited over a `tokio::net::UnixStream`. This crate only models the
//! message shapes and the framing; the CLI/daemon transport itself (socket
//! lifecycle, auth, retries) lives in the `atlas` binary crate, since §1
//! scopes external interfaces to message shapes only.
//!
//! Message format:
//! ```text
//! <JSON value>\n<JSON value>\n...
//! ```
//! One JSON value per line, mirroring `grid-master`'s length-prefixed framing
//! (`sutra-protocol::send_message`/`recv_message`) but adapted to the
//! newline-delimited JSON the reference transport here calls for.

mod error;
mod events;
mod methods;

pub use error::{ProtocolError, Result, MAX_MESSAGE_BYTES};
pub use events::{
    AtlasEvent, ConsolidateProgressEvent, IngestCompleteEvent, IngestProgressEvent,
    WatchFileChangedEvent,
};
pub use methods::{
    AtlasRequest, CollectionStatus, ConsolidateParams, ConsolidateResult, GenerateQntmParams,
    GenerateQntmResult, HealthLevel, HealthResult, IngestParams, IngestResult, SearchParams,
    SearchResult, StatusResult, StorageStatus, SubscriptionParams, TimelineParams,
};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version for compatibility checking between client and daemon.
pub const PROTOCOL_VERSION: &str = "2.0";

/// JSON-RPC request id; clients may use either numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        RequestId::Number(n)
    }
}

/// A framed request: `{"jsonrpc":"2.0","id":...,"method":"atlas.search","params":{...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(flatten)]
    pub call: AtlasRequest,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, call: AtlasRequest) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            id: id.into(),
            call,
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Standard JSON-RPC error codes, plus Atlas-specific codes in the
/// implementation-defined server-error range.
pub mod error_codes {
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    pub const CONFIG_ERROR: i64 = -32001;
    pub const BACKEND_UNAVAILABLE: i64 = -32002;
    pub const BACKEND_FATAL: i64 = -32003;
    pub const VALIDATION_ERROR: i64 = -32004;
    pub const NOT_FOUND: i64 = -32005;
    pub const CANCELLED: i64 = -32006;
}

/// A framed response: either `{"result":...}` or `{"error":...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn ok(id: RequestId, result: impl Serialize) -> serde_json::Result<Self> {
        Ok(Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            id,
            result: Some(serde_json::to_value(result)?),
            error: None,
        })
    }

    pub fn err(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn into_result<T: DeserializeOwned>(self) -> Result<std::result::Result<T, JsonRpcError>> {
        if let Some(error) = self.error {
            return Ok(Err(error));
        }
        let value = self.result.unwrap_or(serde_json::Value::Null);
        Ok(Ok(serde_json::from_value(value)?))
    }
}

/// A framed, unsolicited notification: `{"jsonrpc":"2.0","type":...,"params":...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    #[serde(flatten)]
    pub event: AtlasEvent,
}

impl JsonRpcNotification {
    pub fn new(event: AtlasEvent) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            event,
        }
    }
}

/// Write one JSON value terminated by `\n`.
pub async fn write_line<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut bytes = serde_json::to_vec(value)?;
    if bytes.len() > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::MessageTooLarge(bytes.len()));
    }
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one newline-delimited JSON value. Returns `Ok(None)` on clean EOF.
pub async fn read_line<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: tokio::io::AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    if line.len() > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::MessageTooLarge(line.len()));
    }
    let value = serde_json::from_str(line.trim_end())?;
    Ok(Some(value))
}
