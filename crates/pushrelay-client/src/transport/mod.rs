//! Subscription transport seam and its GraphQL-over-WebSocket implementation.
//!
//! The relay only depends on [`SubscriptionTransport`] and [`SessionHandle`].
//! [`GraphqlWsTransport`] implements them with the `graphql-ws` subprotocol
//! (a.k.a. `subscriptions-transport-ws`) over `tokio-tungstenite`.

pub mod client;
pub mod hook;
#[cfg(test)]
pub(crate) mod mock;
pub mod protocol;

use std::sync::Arc;

use pushrelay_core::SubscriptionQuery;

use crate::session::SessionHandler;

pub use client::{GraphqlWsTransport, TransportConfig};
pub use hook::{RequestHook, StaticHeaders};

/// Errors reported by a subscription transport.
///
/// These are delivered through [`SessionCallback::Failure`](crate::session::SessionCallback::Failure)
/// rather than returned, except when building the transport itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Handshake error: {0}")]
    Handshake(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server reported an error for the subscription or connection.
    #[error("Server error: {0}")]
    Server(String),

    #[error("Timed out waiting for connection_ack")]
    Timeout,

    #[error("Subscriptions are disabled on this transport")]
    SubscriptionsDisabled,

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// One subscription call, ready to execute.
pub trait SessionHandle: Send {
    /// Start the subscription, delivering callbacks to `handler`.
    ///
    /// Errors surface asynchronously as `Failure` callbacks. A handle
    /// executes at most once.
    fn execute(&mut self, handler: Arc<dyn SessionHandler>);

    /// Release the connection. Safe to call repeatedly and before `execute`.
    fn cancel(&mut self);
}

/// Source of subscription sessions.
pub trait SubscriptionTransport: Send + Sync {
    fn subscribe(&self, query: &SubscriptionQuery) -> Box<dyn SessionHandle>;

    /// Close every live session and refuse new ones for the rest of the
    /// process.
    fn disable_subscriptions(&self);
}
