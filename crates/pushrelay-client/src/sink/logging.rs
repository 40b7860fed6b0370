//! Sink that records presentations in the log.

use pushrelay_core::{DisplayRequest, SlotId};
use tracing::info;

use super::{NotificationSink, SinkError};

/// Writes every display request as an `info` event.
///
/// Used when no visible notification surface is available (headless hosts,
/// containers).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, slot: SlotId, request: &DisplayRequest) -> Result<(), SinkError> {
        info!(
            slot,
            title = %request.title,
            body = %request.body,
            "Notification presented"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn always_accepts() {
        let request = DisplayRequest {
            title: "t".to_string(),
            body: String::new(),
        };
        TracingSink.notify(1, &request).unwrap();
    }
}
