//! Event payloads and their text encoding.

use serde::Serialize;
use serde_json::Value;

/// The body of a dispatched event.
///
/// Lists and mappings are carried as JSON and encoded with `serde_json`;
/// text (for example an already serialized row) is sent verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    Structured(Value),
    Text(String),
}

impl EventData {
    /// Serialize any `Serialize` value into structured event data.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Structured)
    }

    /// The message body that goes on the wire.
    pub fn into_body(self) -> Result<String, serde_json::Error> {
        match self {
            EventData::Structured(value) => serde_json::to_string(&value),
            EventData::Text(text) => Ok(text),
        }
    }

    /// Decode a received body: JSON when it parses, otherwise the raw text.
    pub fn decode(body: &str) -> Value {
        serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_owned()))
    }
}

impl From<Value> for EventData {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

impl From<Vec<Value>> for EventData {
    fn from(value: Vec<Value>) -> Self {
        Self::Structured(Value::Array(value))
    }
}

impl From<serde_json::Map<String, Value>> for EventData {
    fn from(value: serde_json::Map<String, Value>) -> Self {
        Self::Structured(Value::Object(value))
    }
}

impl From<String> for EventData {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for EventData {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}
