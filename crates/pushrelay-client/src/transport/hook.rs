//! Request-mutation hook for the WebSocket upgrade request.
//!
//! This is the extension point for attaching credentials or routing headers.
//! The relay itself ships only [`StaticHeaders`].

use std::collections::BTreeMap;

use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderName, HeaderValue};

use super::TransportError;

/// Mutates the upgrade request before it is sent.
pub trait RequestHook: Send + Sync {
    fn apply(&self, request: &mut Request) -> Result<(), TransportError>;
}

impl<F> RequestHook for F
where
    F: Fn(&mut Request) -> Result<(), TransportError> + Send + Sync,
{
    fn apply(&self, request: &mut Request) -> Result<(), TransportError> {
        self(request)
    }
}

/// Inserts a fixed set of headers, replacing any existing values.
#[derive(Debug, Clone, Default)]
pub struct StaticHeaders {
    headers: BTreeMap<String, String>,
}

impl StaticHeaders {
    pub const fn new(headers: BTreeMap<String, String>) -> Self {
        Self { headers }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl RequestHook for StaticHeaders {
    fn apply(&self, request: &mut Request) -> Result<(), TransportError> {
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportError::Handshake(format!("Invalid header name '{name}': {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                TransportError::Handshake(format!("Invalid value for header '{name}': {e}"))
            })?;
            request.headers_mut().insert(name, value);
        }
        Ok(())
    }
}
