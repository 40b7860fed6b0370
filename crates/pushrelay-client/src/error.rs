//! Relay-level error types.

use crate::sink::PresentationError;
use crate::transport::TransportError;

/// Errors raised while assembling or driving a relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Core(#[from] pushrelay_core::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Presentation(#[from] PresentationError),
}
