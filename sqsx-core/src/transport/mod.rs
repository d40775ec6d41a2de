//! Broker and object store seams.
//!
//! The extended client talks to three services through these traits:
//!
//! - [`TopicPublisher`]: publish a message to a topic (SNS)
//! - [`QueueConsumer`]: receive and delete queue messages (SQS)
//! - [`ObjectStore`]: keep offloaded bodies (S3)
//!
//! [`aws`] implements them with the AWS SDK, [`memory`] with an in-process
//! broker that reproduces SNS fan-out to filtered SQS subscriptions.

pub mod aws;
pub mod memory;

use async_trait::async_trait;
use sqsx_sdk::objects::MessageAttributes;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;

pub use aws::{AwsTransport, S3Store, SnsPublisher, SqsConsumer, load_sdk_config};
pub use memory::InMemoryBroker;

/// `DeleteObjects` accepts at most this many keys per call.
pub const MAX_DELETE_BATCH: usize = 1000;

/// Errors raised by a transport. Vendor errors are passed through untouched.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("sns error: {0}")]
    Sns(#[from] aws_sdk_sns::Error),

    #[error("sqs error: {0}")]
    Sqs(#[from] aws_sdk_sqs::Error),

    #[error("s3 error: {0}")]
    S3(#[from] aws_sdk_s3::Error),

    #[error("failed to build request: {0}")]
    Build(#[from] aws_sdk_s3::error::BuildError),

    #[error("failed to read s3 object body: {0}")]
    ByteStream(#[from] aws_sdk_s3::primitives::ByteStreamError),

    #[error("s3 object {key} is not valid utf-8")]
    InvalidUtf8 { key: String },

    #[error("failed to encode notification: {0}")]
    Notification(#[from] sqsx_sdk::objects::NotificationError),

    #[error("queue does not exist: {0}")]
    QueueNotFound(String),

    #[error("receipt handle is not valid: {0}")]
    InvalidReceiptHandle(String),
}

/// A publish call as handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub topic_arn: String,
    pub message: String,
    pub attributes: MessageAttributes,
    pub message_group_id: Option<String>,
    pub message_deduplication_id: Option<String>,
}

/// What the broker returned for a publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOutput {
    pub message_id: Option<String>,
    /// Only set for FIFO topics.
    pub sequence_number: Option<String>,
}

/// A queue message before its SNS envelope is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawQueueMessage {
    pub message_id: Option<String>,
    pub body: String,
    pub receipt_handle: String,
}

/// An entry in a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub last_modified: Option<OffsetDateTime>,
}

#[async_trait]
pub trait TopicPublisher: Send + Sync {
    async fn publish(&self, request: PublishRequest) -> Result<PublishOutput, TransportError>;
}

#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Receive up to `max_messages`, long polling for at most `wait_time`.
    async fn receive(
        &self,
        queue_url: &str,
        max_messages: u8,
        wait_time: Duration,
    ) -> Result<Vec<RawQueueMessage>, TransportError>;

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), TransportError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_text(&self, bucket: &str, key: &str, body: String) -> Result<(), TransportError>;

    /// Fetch an object as UTF-8 text. A missing object is `Ok(None)`.
    async fn get_text(&self, bucket: &str, key: &str) -> Result<Option<String>, TransportError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), TransportError>;

    /// Every object in the bucket.
    async fn list(&self, bucket: &str) -> Result<Vec<StoredObject>, TransportError>;

    /// Delete up to [`MAX_DELETE_BATCH`] keys in one call.
    async fn delete_many(&self, bucket: &str, keys: &[String]) -> Result<(), TransportError>;
}
