//! `graphql-ws` wire messages.
//!
//! Client → server: `connection_init`, `start`, `stop`, `connection_terminate`.
//! Server → client: `connection_ack`, `connection_error`, `ka`, `data`,
//! `error`, `complete`.

use pushrelay_core::{SubscriptionEvent, SubscriptionQuery};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::TransportError;

/// WebSocket subprotocol negotiated with the server.
pub const SUBPROTOCOL: &str = "graphql-ws";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage<'a> {
    ConnectionInit { payload: &'a Value },
    Start {
        id: &'a str,
        payload: &'a SubscriptionQuery,
    },
    Stop { id: &'a str },
    ConnectionTerminate,
}

impl ClientMessage<'_> {
    pub fn to_json(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Protocol(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionAck {
        #[serde(default)]
        payload: Value,
    },
    ConnectionError {
        #[serde(default)]
        payload: Value,
    },
    #[serde(rename = "ka")]
    KeepAlive,
    Data {
        id: String,
        payload: ExecutionResult,
    },
    Error {
        id: String,
        #[serde(default)]
        payload: Value,
    },
    Complete {
        id: String,
    },
    /// Any message type this client does not handle.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self, TransportError> {
        serde_json::from_str(text)
            .map_err(|e| TransportError::Protocol(format!("Invalid server message: {e}")))
    }
}

/// Payload of a `data` message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExecutionResult {
    #[serde(default)]
    pub data: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<GraphqlError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GraphqlError {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ExecutionResult {
    /// Turn the result into an event.
    ///
    /// Errors alongside usable data are left to the caller to log; errors
    /// with no data at all fail the session.
    pub fn into_event(self, root_field: &str) -> Result<SubscriptionEvent, TransportError> {
        if self.data.is_null() && !self.errors.is_empty() {
            return Err(TransportError::Server(join_messages(&self.errors)));
        }
        SubscriptionEvent::from_data(&self.data, root_field)
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }

    pub fn error_summary(&self) -> Option<String> {
        (!self.errors.is_empty()).then(|| join_messages(&self.errors))
    }
}

fn join_messages(errors: &[GraphqlError]) -> String {
    errors
        .iter()
        .map(|e| {
            if e.message.is_empty() {
                "unknown error"
            } else {
                e.message.as_str()
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Human-readable text for an `error` / `connection_error` payload.
///
/// Servers send a single error object, a list of them, or a bare string.
pub fn describe_error_payload(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| payload.to_string(), ToString::to_string),
        Value::Array(items) => items
            .iter()
            .map(describe_error_payload)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Null => "no details".to_string(),
        other => other.to_string(),
    }
}
