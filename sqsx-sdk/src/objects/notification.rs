//! The JSON envelope SNS wraps around every message it delivers to an SQS
//! subscription (unless raw message delivery is enabled).
//!
//! ```text
//! {
//!   "Type": "Notification",
//!   "MessageId": "...",
//!   "TopicArn": "arn:aws:sns:...",
//!   "Message": "<the published body>",
//!   "Timestamp": "2024-01-01T00:00:00.000Z",
//!   "MessageAttributes": {
//!     "event_type": { "Type": "String", "Value": "order_created" }
//!   }
//! }
//! ```
//!
//! Binary attribute values are base64 encoded inside the envelope.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::attributes::{AttributeValue, MessageAttribute, MessageAttributes};

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("invalid notification json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("attribute {name} has an invalid base64 value: {source}")]
    Base64 {
        name: String,
        source: base64::DecodeError,
    },
}

/// One attribute as it appears in the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationAttribute {
    #[serde(rename = "Type")]
    pub kind: String,
    pub value: String,
}

impl From<&MessageAttribute> for NotificationAttribute {
    fn from(attribute: &MessageAttribute) -> Self {
        let value = match &attribute.value {
            AttributeValue::String(s) => s.clone(),
            AttributeValue::Binary(b) => STANDARD.encode(b),
        };
        Self {
            kind: attribute.data_type.clone(),
            value,
        }
    }
}

impl NotificationAttribute {
    fn to_message_attribute(&self, name: &str) -> Result<MessageAttribute, NotificationError> {
        let value = if self.kind.starts_with("Binary") {
            let bytes = STANDARD
                .decode(&self.value)
                .map_err(|source| NotificationError::Base64 {
                    name: name.to_owned(),
                    source,
                })?;
            AttributeValue::Binary(bytes)
        } else {
            AttributeValue::String(self.value.clone())
        };
        Ok(MessageAttribute {
            data_type: self.kind.clone(),
            value,
        })
    }
}

fn notification_kind() -> String {
    "Notification".to_string()
}

/// An SNS notification as found in the body of an SQS message.
///
/// Unknown envelope fields (signature, unsubscribe URL, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnsNotification {
    #[serde(rename = "Type", default = "notification_kind")]
    pub kind: String,
    pub message_id: String,
    #[serde(default)]
    pub topic_arn: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub message_attributes: BTreeMap<String, NotificationAttribute>,
}

impl SnsNotification {
    pub fn new(
        message_id: impl Into<String>,
        topic_arn: impl Into<String>,
        message: impl Into<String>,
        attributes: &MessageAttributes,
    ) -> Self {
        Self {
            kind: notification_kind(),
            message_id: message_id.into(),
            topic_arn: topic_arn.into(),
            message: message.into(),
            timestamp: None,
            message_attributes: attributes
                .iter()
                .map(|(name, attribute)| (name.clone(), NotificationAttribute::from(attribute)))
                .collect(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn parse(body: &str) -> Result<Self, NotificationError> {
        Ok(serde_json::from_str(body)?)
    }

    pub fn to_json(&self) -> Result<String, NotificationError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Attributes converted back to their typed form.
    pub fn attributes(&self) -> Result<MessageAttributes, NotificationError> {
        self.message_attributes
            .iter()
            .map(|(name, attribute)| Ok((name.clone(), attribute.to_message_attribute(name)?)))
            .collect()
    }
}
