//! `PushRelay` Client Library
//!
//! Relays a GraphQL subscription to a local notification surface:
//! - Subscription session lifecycle with supersede-on-start semantics
//! - GraphQL-over-WebSocket (`graphql-ws`) transport
//! - Notification sinks (tracing, in-memory, desktop)
//! - The relay that ties them together and maps host lifecycle events

pub mod error;
pub mod relay;
pub mod session;
pub mod sink;
pub mod transport;

pub use error::RelayError;
pub use relay::{LifecycleEvent, Relay};
pub use session::{
    HandlerError, SessionCallback, SessionHandler, SessionState, SubscriptionSession,
};
pub use sink::{NotificationPresenter, NotificationSink, PresentationError, SinkError};
pub use transport::{GraphqlWsTransport, SessionHandle, SubscriptionTransport, TransportError};
