//! Notification sink adapter.
//!
//! [`NotificationPresenter`] turns a reduced [`NotificationRecord`] into a
//! [`DisplayRequest`] and hands it to a [`NotificationSink`] under a fixed
//! slot. Because the slot never changes, each presentation replaces the
//! previous one.
//!
//! Sinks:
//! - [`TracingSink`] logs presentations through `tracing`
//! - [`MemorySink`] keeps an in-process slot board
//! - `DesktopSink` shows desktop notifications (`desktop` feature)

#[cfg(feature = "desktop")]
pub mod desktop;
pub mod logging;
pub mod memory;

use std::sync::Arc;

use pushrelay_core::{DisplayRequest, NotificationRecord, RelayConfig, SlotId};
use tracing::{debug, instrument};

#[cfg(feature = "desktop")]
pub use desktop::DesktopSink;
pub use logging::TracingSink;
pub use memory::MemorySink;

/// Errors raised by a notification facility.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The facility cannot be reached (no notification daemon, shut down).
    #[error("Notification facility unavailable: {0}")]
    Unavailable(String),

    /// The facility refused the request.
    #[error("Notification rejected: {0}")]
    Rejected(String),
}

/// A presentation that the sink did not accept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to present notification in slot {slot}: {source}")]
pub struct PresentationError {
    pub slot: SlotId,
    #[source]
    pub source: SinkError,
}

/// The host's visible notification surface.
pub trait NotificationSink: Send + Sync {
    /// Show `request` in `slot`, replacing whatever the slot showed before.
    fn notify(&self, slot: SlotId, request: &DisplayRequest) -> Result<(), SinkError>;
}

/// Maps records to display requests with a fixed title and slot.
#[derive(Clone)]
pub struct NotificationPresenter {
    sink: Arc<dyn NotificationSink>,
    title: String,
    slot: SlotId,
}

impl NotificationPresenter {
    pub fn new(sink: Arc<dyn NotificationSink>, title: impl Into<String>, slot: SlotId) -> Self {
        Self {
            sink,
            title: title.into(),
            slot,
        }
    }

    pub fn from_config(sink: Arc<dyn NotificationSink>, config: &RelayConfig) -> Self {
        Self::new(sink, config.title.clone(), config.slot_id)
    }

    pub const fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Build the display request for `record` without presenting it.
    pub fn display_request(&self, record: &NotificationRecord) -> DisplayRequest {
        DisplayRequest {
            title: self.title.clone(),
            body: record.message.clone(),
        }
    }

    /// Present `record`. Exactly one `notify` call is made per invocation,
    /// whatever the record contains.
    ///
    /// # Errors
    ///
    /// Returns [`PresentationError`] when the sink fails; nothing is retried.
    #[instrument(skip(self, record), fields(slot = self.slot))]
    pub fn present(&self, record: &NotificationRecord) -> Result<DisplayRequest, PresentationError> {
        let request = self.display_request(record);
        self.sink
            .notify(self.slot, &request)
            .map_err(|source| PresentationError {
                slot: self.slot,
                source,
            })?;
        debug!(body_len = request.body.len(), "Notification presented");
        Ok(request)
    }
}

impl std::fmt::Debug for NotificationPresenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationPresenter")
            .field("title", &self.title)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}
