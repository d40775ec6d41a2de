//! Message attributes as sent alongside a topic publish.

use std::collections::BTreeMap;
use std::fmt::Display;

/// The value half of a message attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Used by `String` and `Number` data types (numbers travel as text).
    String(String),
    /// Raw bytes of a `Binary` attribute.
    Binary(Vec<u8>),
}

/// A single typed message attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttribute {
    /// `String`, `Number`, `Binary`, optionally with a custom suffix
    /// such as `String.Json`.
    pub data_type: String,
    pub value: AttributeValue,
}

impl MessageAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            value: AttributeValue::String(value.into()),
        }
    }

    pub fn number(value: impl Display) -> Self {
        Self {
            data_type: "Number".to_string(),
            value: AttributeValue::String(value.to_string()),
        }
    }

    pub fn binary(value: impl Into<Vec<u8>>) -> Self {
        Self {
            data_type: "Binary".to_string(),
            value: AttributeValue::Binary(value.into()),
        }
    }

    /// The textual value, if this is not a binary attribute.
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            AttributeValue::String(s) => Some(s),
            AttributeValue::Binary(_) => None,
        }
    }

    /// Bytes this attribute contributes to the message size, excluding its name.
    pub fn size_in_bytes(&self) -> usize {
        let value = match &self.value {
            AttributeValue::String(s) => s.len(),
            AttributeValue::Binary(b) => b.len(),
        };
        self.data_type.len() + value
    }
}

/// Named attributes of one message, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageAttributes(BTreeMap<String, MessageAttribute>);

impl MessageAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, attribute: MessageAttribute) {
        self.0.insert(name.into(), attribute);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, attribute: MessageAttribute) -> Self {
        self.insert(name, attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&MessageAttribute> {
        self.0.get(name)
    }

    /// Shortcut for the textual value of `name`.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(MessageAttribute::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<MessageAttribute> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MessageAttribute)> {
        self.0.iter()
    }

    /// Total size the broker counts against the message limit:
    /// every name, data type and value, in UTF-8 bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.0
            .iter()
            .map(|(name, attribute)| name.len() + attribute.size_in_bytes())
            .sum()
    }
}

impl FromIterator<(String, MessageAttribute)> for MessageAttributes {
    fn from_iter<I: IntoIterator<Item = (String, MessageAttribute)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for MessageAttributes {
    type Item = (String, MessageAttribute);
    type IntoIter = std::collections::btree_map::IntoIter<String, MessageAttribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
