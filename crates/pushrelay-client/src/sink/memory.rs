//! In-process slot board.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use pushrelay_core::{DisplayRequest, SlotId};

use super::{NotificationSink, SinkError};

#[derive(Debug)]
struct Board {
    available: bool,
    slots: HashMap<SlotId, DisplayRequest>,
    history: Vec<(SlotId, DisplayRequest)>,
}

/// Keeps what each slot currently shows, plus every accepted presentation.
///
/// Thread-safe, so it can be shared with a transport task and inspected
/// from the host.
#[derive(Debug)]
pub struct MemorySink {
    board: Mutex<Board>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            board: Mutex::new(Board {
                available: true,
                slots: HashMap::new(),
                history: Vec::new(),
            }),
        }
    }

    fn board(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make subsequent `notify` calls fail with `SinkError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.board().available = available;
    }

    /// What `slot` currently shows.
    pub fn visible(&self, slot: SlotId) -> Option<DisplayRequest> {
        self.board().slots.get(&slot).cloned()
    }

    /// Number of occupied slots.
    pub fn visible_count(&self) -> usize {
        self.board().slots.len()
    }

    /// Number of accepted presentations.
    pub fn presentation_count(&self) -> usize {
        self.board().history.len()
    }

    pub fn history(&self) -> Vec<(SlotId, DisplayRequest)> {
        self.board().history.clone()
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, slot: SlotId, request: &DisplayRequest) -> Result<(), SinkError> {
        let mut board = self.board();
        if !board.available {
            return Err(SinkError::Unavailable("memory sink disabled".to_string()));
        }
        board.slots.insert(slot, request.clone());
        board.history.push((slot, request.clone()));
        Ok(())
    }
}
