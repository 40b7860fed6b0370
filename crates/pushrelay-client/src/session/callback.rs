//! Callbacks delivered by a subscription transport.

use pushrelay_core::SubscriptionEvent;

use crate::transport::TransportError;

/// Everything a transport can report about a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCallback {
    /// The server acknowledged the connection.
    Connected,
    /// One push from the subscription.
    Event(SubscriptionEvent),
    /// The transport failed. Nothing retries.
    Failure(TransportError),
    /// The connection closed without the subscription completing.
    Terminated,
    /// The server completed the subscription.
    Completed,
}

impl SessionCallback {
    /// Short name used in log fields.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Event(_) => "event",
            Self::Failure(_) => "failure",
            Self::Terminated => "terminated",
            Self::Completed => "completed",
        }
    }
}

/// A handler could not process a callback.
///
/// Returning it ends the session: the transport releases the connection and
/// delivers nothing more.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Session handler failed: {0}")]
pub struct HandlerError(pub String);

/// Receiver for session callbacks.
///
/// Invoked from the transport's task. Implementations must not assume any
/// particular thread and must tolerate being called while the owner is
/// cancelling the session.
pub trait SessionHandler: Send + Sync {
    fn on_callback(&self, callback: SessionCallback) -> Result<(), HandlerError>;
}

impl<F> SessionHandler for F
where
    F: Fn(SessionCallback) + Send + Sync,
{
    fn on_callback(&self, callback: SessionCallback) -> Result<(), HandlerError> {
        self(callback);
        Ok(())
    }
}
