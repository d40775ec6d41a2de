//! Receipt handles that remember where an offloaded body lives.
//!
//! Deleting an offloaded message should also be able to delete its S3
//! object, so the pointer is carried with the handle. The textual form
//! embeds it between markers in front of the broker's own handle:
//!
//! ```text
//! -..s3BucketName..-{bucket}-..s3BucketName..--..s3Key..-{key}-..s3Key..-{handle}
//! ```

use std::fmt;
use std::str::FromStr;

use super::pointer::PayloadPointer;
use crate::constants::{S3_BUCKET_NAME_MARKER, S3_KEY_MARKER};

#[derive(Debug, thiserror::Error)]
pub enum ReceiptHandleError {
    #[error("receipt handle is missing the {0} marker pair")]
    MissingMarker(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptHandle {
    handle: String,
    payload: Option<PayloadPointer>,
}

impl ReceiptHandle {
    /// A handle for a message whose body was inline.
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            payload: None,
        }
    }

    /// A handle for a message whose body was fetched from S3.
    pub fn with_payload(handle: impl Into<String>, payload: PayloadPointer) -> Self {
        Self {
            handle: handle.into(),
            payload: Some(payload),
        }
    }

    /// The handle the broker issued, without any embedded pointer.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn payload(&self) -> Option<&PayloadPointer> {
        self.payload.as_ref()
    }

    /// Whether the textual handle carries an S3 pointer.
    pub fn is_marked(s: &str) -> bool {
        s.contains(S3_BUCKET_NAME_MARKER) && s.contains(S3_KEY_MARKER)
    }
}

/// Text between the first occurrence of `marker` and its last occurrence after that.
fn between_markers<'a>(s: &'a str, marker: &'static str) -> Result<&'a str, ReceiptHandleError> {
    let start = s
        .find(marker)
        .map(|i| i + marker.len())
        .ok_or(ReceiptHandleError::MissingMarker(marker))?;
    let end = s[start..]
        .rfind(marker)
        .map(|i| i + start)
        .ok_or(ReceiptHandleError::MissingMarker(marker))?;
    Ok(&s[start..end])
}

impl FromStr for ReceiptHandle {
    type Err = ReceiptHandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !Self::is_marked(s) {
            return Ok(Self::new(s));
        }
        let bucket = between_markers(s, S3_BUCKET_NAME_MARKER)?;
        let key = between_markers(s, S3_KEY_MARKER)?;
        let original = s
            .rfind(S3_KEY_MARKER)
            .map(|i| &s[i + S3_KEY_MARKER.len()..])
            .ok_or(ReceiptHandleError::MissingMarker(S3_KEY_MARKER))?;
        Ok(Self::with_payload(original, PayloadPointer::new(bucket, key)))
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            None => f.write_str(&self.handle),
            Some(pointer) => write!(
                f,
                "{b}{bucket}{b}{k}{key}{k}{handle}",
                b = S3_BUCKET_NAME_MARKER,
                k = S3_KEY_MARKER,
                bucket = pointer.bucket,
                key = pointer.key,
                handle = self.handle,
            ),
        }
    }
}
