//! Desktop notifications via `notify-rust`.

use pushrelay_core::{DisplayRequest, SlotId};
use tracing::debug;

use super::{NotificationSink, SinkError};

/// Shows each request as a desktop notification.
///
/// On XDG desktops the slot is used as the notification id, so a new
/// request replaces the one already on screen. Other platforms show a new
/// notification each time.
#[derive(Debug, Clone)]
pub struct DesktopSink {
    app_name: String,
}

impl DesktopSink {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Default for DesktopSink {
    fn default() -> Self {
        Self::new("pushrelay")
    }
}

impl NotificationSink for DesktopSink {
    fn notify(&self, slot: SlotId, request: &DisplayRequest) -> Result<(), SinkError> {
        let mut notification = notify_rust::Notification::new();
        notification
            .appname(&self.app_name)
            .summary(&request.title)
            .body(&request.body);
        #[cfg(all(unix, not(target_os = "macos")))]
        notification.id(slot);

        notification
            .show()
            .map(|_| ())
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        debug!(slot, "Desktop notification shown");
        Ok(())
    }
}
