//! `PushRelay` Core Library
//!
//! Shared functionality for the subscription-to-notification relay:
//! - Notification records, subscription events and display requests
//! - The "most recent wins" event reducer
//! - Configuration resolution and hierarchy
//! - Common error types

pub mod config;
pub mod error;
pub mod models;
pub mod reducer;
pub mod tracing_init;

pub use config::RelayConfig;
pub use error::{Error, Result};
pub use models::{DisplayRequest, NotificationRecord, SlotId, SubscriptionEvent, SubscriptionQuery};
pub use reducer::reduce;
