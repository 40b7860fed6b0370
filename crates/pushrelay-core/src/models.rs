//! Data model shared by the session, reducer and sink.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Identifier of the notification slot a display request is written to.
///
/// The relay uses one constant slot, so each new notification replaces the
/// previous one instead of stacking.
pub type SlotId = u32;

/// Default subscription document, matching the backend's `notification` table.
pub const DEFAULT_QUERY: &str = "subscription GetNotifications { notification { message } }";

/// Default operation name sent alongside [`DEFAULT_QUERY`].
pub const DEFAULT_OPERATION_NAME: &str = "GetNotifications";

/// Default root field of the subscription's `data` object.
pub const DEFAULT_ROOT_FIELD: &str = "notification";

/// A single notification pushed by the backend.
///
/// `message` is taken as-is: a missing or `null` message decodes to an empty
/// string, and other scalars keep their JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: String,
}

impl NotificationRecord {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One push from the subscription: zero or more records, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionEvent {
    records: Vec<NotificationRecord>,
}

impl SubscriptionEvent {
    pub const fn new(records: Vec<NotificationRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[NotificationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Decode an event from the `data` object of a subscription result.
    ///
    /// A `null` data object, or a missing/`null` root field, decodes to an
    /// empty event. Anything else under `root_field` must be a list of
    /// `{ "message": ... }` objects.
    pub fn from_data(data: &Value, root_field: &str) -> Result<Self> {
        let field = match data {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map.get(root_field).unwrap_or(&Value::Null),
            other => {
                return Err(Error::Payload(format!(
                    "expected `data` to be an object, found {}",
                    json_kind(other)
                )));
            }
        };

        match field {
            Value::Null => Ok(Self::default()),
            Value::Array(_) => {
                let records = Vec::<NotificationRecord>::deserialize(field)?;
                Ok(Self { records })
            }
            other => Err(Error::Payload(format!(
                "expected `{root_field}` to be a list, found {}",
                json_kind(other)
            ))),
        }
    }
}

impl From<Vec<NotificationRecord>> for SubscriptionEvent {
    fn from(records: Vec<NotificationRecord>) -> Self {
        Self { records }
    }
}

impl FromIterator<NotificationRecord> for SubscriptionEvent {
    fn from_iter<I: IntoIterator<Item = NotificationRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// What the notification facility is asked to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRequest {
    pub title: String,
    pub body: String,
}

/// The fixed GraphQL subscription a session is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionQuery {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default, skip_serializing_if = "is_empty_object")]
    pub variables: Value,
}

impl SubscriptionQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: Value::Object(serde_json::Map::new()),
        }
    }

    #[must_use]
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }
}

impl Default for SubscriptionQuery {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY).with_operation_name(DEFAULT_OPERATION_NAME)
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    })
}

fn is_empty_object(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
