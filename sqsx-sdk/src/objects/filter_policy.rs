//! SNS subscription filter policies on the `event_type` attribute.

use serde::{Deserialize, Serialize};

use super::attributes::MessageAttributes;
use crate::constants::EVENT_TYPE_ATTRIBUTE;

/// Exact-match filter on the `event_type` attribute.
///
/// Serializes to the JSON document SNS expects on a subscription, e.g.
/// `{"event_type":["order_created"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPolicy {
    pub event_type: Vec<String>,
}

impl FilterPolicy {
    pub fn new(event_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            event_type: event_types.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a message with these attributes is delivered to the subscription.
    pub fn matches(&self, attributes: &MessageAttributes) -> bool {
        attributes
            .get_str(EVENT_TYPE_ATTRIBUTE)
            .is_some_and(|value| self.event_type.iter().any(|allowed| allowed == value))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
