//! Subscription session lifecycle.
//!
//! A session wraps one transport handle and tracks where it is in the
//! `Idle → Connecting → Connected → Receiving* → Terminated` lifecycle.
//! `Cancelled` and `Failed` are the other terminal states. Callbacks from
//! the transport pass through the session's state gate before reaching the
//! caller's handler, so nothing is forwarded once a session is terminal.

pub mod callback;
pub mod state;
pub mod subscription;

pub use callback::{HandlerError, SessionCallback, SessionHandler};
pub use state::SessionState;
pub use subscription::SubscriptionSession;
