//! Overflow storage configuration.

use sqsx_sdk::constants::DEFAULT_MESSAGE_SIZE_THRESHOLD;

/// Where and when message bodies are offloaded to S3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Bucket receiving offloaded bodies.
    pub bucket: String,
    /// Offload every message regardless of its size.
    pub always_through_s3: bool,
    /// Size in bytes above which a message is offloaded.
    pub message_size_threshold: usize,
}

impl StorageConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            always_through_s3: false,
            message_size_threshold: DEFAULT_MESSAGE_SIZE_THRESHOLD,
        }
    }
}
