//! Session state machine.

use std::fmt;

use super::callback::SessionCallback;

/// Lifecycle state of a [`SubscriptionSession`](super::SubscriptionSession).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Receiving,
    Terminated,
    Cancelled,
    Failed,
}

impl SessionState {
    /// Terminal states never change again and forward no callbacks.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated | Self::Cancelled | Self::Failed)
    }

    /// Whether the session holds (or is acquiring) a live connection.
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Receiving)
    }

    /// Apply a transport callback.
    ///
    /// Returns `false` when the callback must be dropped instead of being
    /// forwarded to the handler.
    pub(crate) fn apply(&mut self, callback: &SessionCallback) -> bool {
        if self.is_terminal() {
            return false;
        }
        *self = match callback {
            SessionCallback::Connected => match self {
                Self::Receiving => Self::Receiving,
                _ => Self::Connected,
            },
            SessionCallback::Event(_) => Self::Receiving,
            SessionCallback::Failure(_) => Self::Failed,
            SessionCallback::Terminated | SessionCallback::Completed => Self::Terminated,
        };
        true
    }

    /// Move to `Cancelled` if the session is live.
    ///
    /// Returns `true` when the transport connection has to be released.
    pub(crate) fn cancel(&mut self) -> bool {
        if self.is_live() {
            *self = Self::Cancelled;
            true
        } else {
            false
        }
    }

    /// Move to `Failed` if the session is live. A session that was
    /// cancelled meanwhile stays `Cancelled`.
    pub(crate) fn fail(&mut self) -> bool {
        if self.is_live() {
            *self = Self::Failed;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Receiving => "receiving",
            Self::Terminated => "terminated",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
