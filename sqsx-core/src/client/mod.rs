//! Extended client: SNS publishing and SQS receiving with S3 offload.
//!
//! Messages whose body plus attributes exceed the size threshold are
//! stored in S3 and replaced by a [`PayloadPointer`]; the reserved
//! `SQSLargePayloadSize` attribute marks them. On receive the pointer is
//! resolved so callers see the original body, and the receipt handle keeps
//! the pointer so the object can be removed together with the message.

use crate::config::StorageConfig;
use crate::transport::{
    InMemoryBroker, ObjectStore, PublishRequest, QueueConsumer, RawQueueMessage, TopicPublisher,
    TransportError,
};
use sqsx_sdk::constants::{
    MAX_ALLOWED_ATTRIBUTES, MAX_RECEIVE_BATCH, RESERVED_ATTRIBUTE_NAME, S3_BUCKET_NAME_ATTRIBUTE,
    S3_KEY_ATTRIBUTE,
};
use sqsx_sdk::objects::{
    MessageAttribute, MessageAttributes, NotificationError, PayloadPointer, ReceiptHandle,
    ReceiptHandleError, SnsNotification,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ExtendedClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(
        "total size of message attributes is {size} bytes which is larger than the threshold of {threshold} bytes; \
         consider including the payload in the message body instead of message attributes"
    )]
    AttributesTooLarge { size: usize, threshold: usize },

    #[error("number of message attributes [{count}] exceeds the maximum allowed for large-payload messages [{max}]")]
    TooManyAttributes { count: usize, max: usize },

    #[error("message attribute name SQSLargePayloadSize is reserved for use by the extended client")]
    ReservedAttribute,

    #[error("s3 bucket name cannot be empty")]
    MissingBucket,

    #[error("failed to encode payload pointer: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("message body is not an sns notification: {0}")]
    Notification(#[from] NotificationError),

    #[error("offloaded message does not carry a valid s3 pointer: {0}")]
    InvalidPointer(#[source] serde_json::Error),

    #[error("offloaded payload s3://{bucket}/{key} no longer exists")]
    MissingPayload { bucket: String, key: String },

    #[error(transparent)]
    InvalidReceiptHandle(#[from] ReceiptHandleError),
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub message_id: Option<String>,
    pub sequence_number: Option<String>,
    /// Where the body went when it was offloaded.
    pub offloaded: Option<PayloadPointer>,
}

/// A received message with its body resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub topic_arn: String,
    /// The original body, fetched from S3 if it was offloaded.
    pub body: String,
    /// Publisher attributes. The reserved size attribute is removed; `s3_key`
    /// and `s3_bucket_name` are added for bodies that came from S3.
    pub attributes: MessageAttributes,
    /// Receipt handle to delete the message with. For offloaded bodies the
    /// S3 pointer is embedded between markers.
    pub receipt_handle: String,
}

pub struct ExtendedClient {
    publisher: Arc<dyn TopicPublisher>,
    consumer: Arc<dyn QueueConsumer>,
    store: Arc<dyn ObjectStore>,
    bucket: String,
    message_size_threshold: usize,
    always_through_s3: bool,
}

impl ExtendedClient {
    pub fn new(
        publisher: Arc<dyn TopicPublisher>,
        consumer: Arc<dyn QueueConsumer>,
        store: Arc<dyn ObjectStore>,
        storage: &StorageConfig,
    ) -> Self {
        Self {
            publisher,
            consumer,
            store,
            bucket: storage.bucket.clone(),
            message_size_threshold: storage.message_size_threshold,
            always_through_s3: storage.always_through_s3,
        }
    }

    /// A client whose three transports are the same in-memory broker.
    pub fn in_memory(broker: &InMemoryBroker, storage: &StorageConfig) -> Self {
        let broker = Arc::new(broker.clone());
        Self::new(broker.clone(), broker.clone(), broker, storage)
    }

    /// Store every message in S3, whatever its size.
    pub fn set_always_through_s3(&mut self, always_through_s3: bool) {
        self.always_through_s3 = always_through_s3;
    }

    /// Size in bytes above which messages are offloaded.
    pub fn set_message_size_threshold(&mut self, message_size_threshold: usize) {
        self.message_size_threshold = message_size_threshold;
    }

    fn is_large(&self, message: &str, attributes: &MessageAttributes) -> bool {
        attributes.size_in_bytes() + message.len() > self.message_size_threshold
    }

    /// Publish `message` to `topic_arn`, offloading the body when needed.
    pub async fn send_message(
        &self,
        topic_arn: &str,
        message: String,
        mut attributes: MessageAttributes,
        message_group_id: Option<String>,
        message_deduplication_id: Option<String>,
    ) -> Result<PublishReceipt, ExtendedClientError> {
        let attributes_size = attributes.size_in_bytes();
        if attributes_size > self.message_size_threshold {
            return Err(ExtendedClientError::AttributesTooLarge {
                size: attributes_size,
                threshold: self.message_size_threshold,
            });
        }

        if attributes.len() > MAX_ALLOWED_ATTRIBUTES {
            return Err(ExtendedClientError::TooManyAttributes {
                count: attributes.len(),
                max: MAX_ALLOWED_ATTRIBUTES,
            });
        }

        if attributes.contains(RESERVED_ATTRIBUTE_NAME) {
            return Err(ExtendedClientError::ReservedAttribute);
        }

        let mut body = message;
        let mut offloaded = None;

        if self.always_through_s3 || self.is_large(&body, &attributes) {
            if self.bucket.trim().is_empty() {
                return Err(ExtendedClientError::MissingBucket);
            }

            let original_size = body.len();
            let pointer = self.store_message(body).await?;
            attributes.insert(
                RESERVED_ATTRIBUTE_NAME,
                MessageAttribute::number(original_size),
            );
            body = pointer.to_json()?;
            debug!(
                bucket = %pointer.bucket,
                key = %pointer.key,
                size = original_size,
                "Offloaded message body to S3"
            );
            offloaded = Some(pointer);
        }

        let output = self
            .publisher
            .publish(PublishRequest {
                topic_arn: topic_arn.to_owned(),
                message: body,
                attributes,
                message_group_id,
                message_deduplication_id,
            })
            .await?;

        Ok(PublishReceipt {
            message_id: output.message_id,
            sequence_number: output.sequence_number,
            offloaded,
        })
    }

    async fn store_message(&self, body: String) -> Result<PayloadPointer, ExtendedClientError> {
        let key = Uuid::new_v4().to_string();
        self.store
            .put_text(&self.bucket, &key, body)
            .await
            .map_err(|e| {
                error!(
                    bucket = %self.bucket,
                    error = %e,
                    "Failed to store the message content in an S3 object, message was not sent"
                );
                e
            })?;
        Ok(PayloadPointer::new(self.bucket.clone(), key))
    }

    /// Receive up to `max_messages` (clamped to 1..=10) and resolve their bodies.
    pub async fn receive_message(
        &self,
        queue_url: &str,
        max_messages: u8,
        wait_time: Duration,
    ) -> Result<Vec<ReceivedMessage>, ExtendedClientError> {
        let max_messages = max_messages.clamp(1, MAX_RECEIVE_BATCH);
        let raw = self
            .consumer
            .receive(queue_url, max_messages, wait_time)
            .await?;

        let mut messages = Vec::with_capacity(raw.len());
        for message in raw {
            messages.push(self.resolve(message).await?);
        }
        Ok(messages)
    }

    async fn resolve(&self, raw: RawQueueMessage) -> Result<ReceivedMessage, ExtendedClientError> {
        let notification = SnsNotification::parse(&raw.body)?;
        let mut attributes = notification.attributes()?;
        let message_id = raw.message_id.unwrap_or(notification.message_id);

        if attributes.remove(RESERVED_ATTRIBUTE_NAME).is_none() {
            return Ok(ReceivedMessage {
                message_id,
                topic_arn: notification.topic_arn,
                body: notification.message,
                attributes,
                receipt_handle: raw.receipt_handle,
            });
        }

        let pointer = PayloadPointer::parse(&notification.message)
            .map_err(ExtendedClientError::InvalidPointer)?;
        let body = self
            .store
            .get_text(&pointer.bucket, &pointer.key)
            .await?
            .ok_or_else(|| ExtendedClientError::MissingPayload {
                bucket: pointer.bucket.clone(),
                key: pointer.key.clone(),
            })?;

        attributes.insert(S3_KEY_ATTRIBUTE, MessageAttribute::string(&pointer.key));
        attributes.insert(
            S3_BUCKET_NAME_ATTRIBUTE,
            MessageAttribute::string(&pointer.bucket),
        );
        debug!(
            message_id = %message_id,
            bucket = %pointer.bucket,
            key = %pointer.key,
            "Resolved offloaded message body"
        );

        Ok(ReceivedMessage {
            message_id,
            topic_arn: notification.topic_arn,
            body,
            attributes,
            receipt_handle: ReceiptHandle::with_payload(raw.receipt_handle, pointer).to_string(),
        })
    }

    /// Delete a message from the queue.
    ///
    /// `receipt_handle` is the handle from [`ReceivedMessage`]. With
    /// `flush_s3` the offloaded body is deleted first; a failure there is
    /// returned and the message stays on the queue. A failing queue delete
    /// is only logged: the broker may already have dropped the message.
    pub async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        flush_s3: bool,
    ) -> Result<(), ExtendedClientError> {
        let receipt_handle: ReceiptHandle = receipt_handle.parse()?;
        if let (Some(pointer), true) = (receipt_handle.payload(), flush_s3) {
            self.store
                .delete(&pointer.bucket, &pointer.key)
                .await
                .map_err(|e| {
                    error!(
                        bucket = %pointer.bucket,
                        key = %pointer.key,
                        error = %e,
                        "Failed to delete the message content in S3"
                    );
                    e
                })?;
            info!(bucket = %pointer.bucket, key = %pointer.key, "Deleted S3 object");
        }

        debug!(receipt_handle = receipt_handle.handle(), "Deleting message");
        if let Err(e) = self
            .consumer
            .delete(queue_url, receipt_handle.handle())
            .await
        {
            warn!(queue_url, error = %e, "Failed to delete message, ignoring");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StoredObject;

    const TOPIC: &str = "arn:aws:sns:local:000000000000:events";
    const QUEUE: &str = "http://localhost/000000000000/orders";
    const BUCKET: &str = "overflow";

    fn setup(threshold: usize) -> (InMemoryBroker, ExtendedClient) {
        let broker = InMemoryBroker::new();
        broker.subscribe(TOPIC, QUEUE, None);
        let mut storage = StorageConfig::new(BUCKET);
        storage.message_size_threshold = threshold;
        let client = ExtendedClient::in_memory(&broker, &storage);
        (broker, client)
    }

    fn event_type(name: &str) -> MessageAttributes {
        MessageAttributes::new().with("event_type", MessageAttribute::string(name))
    }

    #[tokio::test]
    async fn test_small_message_stays_inline() {
        let (broker, client) = setup(1024);
        let receipt = client
            .send_message(TOPIC, "small".into(), event_type("x"), None, None)
            .await
            .unwrap();

        assert!(receipt.offloaded.is_none());
        assert_eq!(broker.object_count(BUCKET), 0);
        let published = broker.published();
        assert_eq!(published[0].message, "small");
        assert!(!published[0].attributes.contains(RESERVED_ATTRIBUTE_NAME));
    }

    #[tokio::test]
    async fn test_large_message_is_offloaded() {
        let (broker, client) = setup(64);
        let body = "x".repeat(100);
        let receipt = client
            .send_message(TOPIC, body.clone(), event_type("x"), None, None)
            .await
            .unwrap();

        let pointer = receipt.offloaded.unwrap();
        assert_eq!(pointer.bucket, BUCKET);
        assert_eq!(broker.object_keys(BUCKET), vec![pointer.key.clone()]);

        let published = &broker.published()[0];
        assert_eq!(PayloadPointer::parse(&published.message).unwrap(), pointer);
        assert_eq!(
            published.attributes.get_str(RESERVED_ATTRIBUTE_NAME),
            Some("100")
        );
    }

    #[tokio::test]
    async fn test_attributes_count_towards_threshold() {
        // 50 bytes of body fit on their own, but not with the attribute added.
        let (_broker, client) = setup(60);
        let receipt = client
            .send_message(TOPIC, "y".repeat(50), event_type("order"), None, None)
            .await
            .unwrap();
        assert!(receipt.offloaded.is_some());
    }

    #[tokio::test]
    async fn test_always_through_s3() {
        let (broker, mut client) = setup(1024);
        client.set_always_through_s3(true);
        client
            .send_message(TOPIC, "tiny".into(), event_type("x"), None, None)
            .await
            .unwrap();
        assert_eq!(broker.object_count(BUCKET), 1);
    }

    #[tokio::test]
    async fn test_rejects_reserved_attribute() {
        let (_broker, client) = setup(1024);
        let attributes =
            event_type("x").with(RESERVED_ATTRIBUTE_NAME, MessageAttribute::number(1));
        let err = client
            .send_message(TOPIC, "m".into(), attributes, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtendedClientError::ReservedAttribute));
    }

    #[tokio::test]
    async fn test_rejects_too_many_attributes() {
        let (_broker, client) = setup(1024);
        let attributes = (0..10)
            .map(|i| (format!("a{i}"), MessageAttribute::string("v")))
            .collect();
        let err = client
            .send_message(TOPIC, "m".into(), attributes, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExtendedClientError::TooManyAttributes { count: 10, max: 9 }
        ));
    }

    #[tokio::test]
    async fn test_rejects_oversized_attributes() {
        let (_broker, client) = setup(16);
        let err = client
            .send_message(
                TOPIC,
                "m".into(),
                event_type("a-long-event-name"),
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExtendedClientError::AttributesTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_offload_requires_bucket() {
        let broker = InMemoryBroker::new();
        let mut storage = StorageConfig::new("  ");
        storage.always_through_s3 = true;
        let client = ExtendedClient::in_memory(&broker, &storage);
        let err = client
            .send_message(TOPIC, "m".into(), MessageAttributes::new(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtendedClientError::MissingBucket));
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn test_fifo_ids_are_forwarded() {
        let (broker, client) = setup(1024);
        let receipt = client
            .send_message(
                TOPIC,
                "m".into(),
                event_type("x"),
                Some("group-1".into()),
                Some("dedup-1".into()),
            )
            .await
            .unwrap();
        let published = &broker.published()[0];
        assert_eq!(published.message_group_id.as_deref(), Some("group-1"));
        assert_eq!(
            published.message_deduplication_id.as_deref(),
            Some("dedup-1")
        );
        assert!(receipt.sequence_number.is_some());
    }

    #[tokio::test]
    async fn test_offloaded_message_resolves_to_original_body() {
        let (broker, client) = setup(64);
        let body = "z".repeat(500);
        client
            .send_message(TOPIC, body.clone(), event_type("x"), None, None)
            .await
            .unwrap();

        let received = client
            .receive_message(QUEUE, 10, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(received.len(), 1);
        let message = &received[0];
        assert_eq!(message.body, body);
        assert!(!message.attributes.contains(RESERVED_ATTRIBUTE_NAME));
        assert_eq!(message.attributes.get_str("event_type"), Some("x"));

        let handle: ReceiptHandle = message.receipt_handle.parse().unwrap();
        let pointer = handle.payload().unwrap();
        assert_eq!(
            message.attributes.get_str(S3_KEY_ATTRIBUTE),
            Some(pointer.key.as_str())
        );
        assert_eq!(
            message.attributes.get_str(S3_BUCKET_NAME_ATTRIBUTE),
            Some(BUCKET)
        );
        assert_eq!(broker.object_count(BUCKET), 1);
    }

    #[tokio::test]
    async fn test_delete_with_flush_removes_object() {
        let (broker, client) = setup(64);
        client
            .send_message(TOPIC, "z".repeat(500), event_type("x"), None, None)
            .await
            .unwrap();
        let received = client
            .receive_message(QUEUE, 1, Duration::ZERO)
            .await
            .unwrap();

        client
            .delete_message(QUEUE, &received[0].receipt_handle, true)
            .await
            .unwrap();
        assert_eq!(broker.object_count(BUCKET), 0);
        assert_eq!(broker.in_flight_len(), 0);
        let handle: ReceiptHandle = received[0].receipt_handle.parse().unwrap();
        assert_eq!(broker.deleted_receipts(), vec![handle.handle().to_owned()]);
    }

    #[tokio::test]
    async fn test_delete_without_flush_keeps_object() {
        let (broker, client) = setup(64);
        client
            .send_message(TOPIC, "z".repeat(500), event_type("x"), None, None)
            .await
            .unwrap();
        let received = client
            .receive_message(QUEUE, 1, Duration::ZERO)
            .await
            .unwrap();

        client
            .delete_message(QUEUE, &received[0].receipt_handle, false)
            .await
            .unwrap();
        assert_eq!(broker.object_count(BUCKET), 1);
        assert_eq!(broker.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_failed_queue_delete_is_swallowed() {
        let (_broker, client) = setup(64);
        let result = client
            .delete_message(QUEUE, "already-gone", true)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_offloaded_object_is_an_error() {
        let (broker, client) = setup(64);
        let receipt = client
            .send_message(TOPIC, "z".repeat(500), event_type("x"), None, None)
            .await
            .unwrap();
        let pointer = receipt.offloaded.unwrap();
        ObjectStore::delete(&broker, &pointer.bucket, &pointer.key)
            .await
            .unwrap();

        let err = client
            .receive_message(QUEUE, 1, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtendedClientError::MissingPayload { .. }));
    }

    #[tokio::test]
    async fn test_non_notification_body_is_an_error() {
        let (broker, client) = setup(64);
        broker.enqueue_raw(QUEUE, "not json");
        let err = client
            .receive_message(QUEUE, 1, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtendedClientError::Notification(_)));
    }

    #[tokio::test]
    async fn test_reserved_attribute_without_pointer_is_an_error() {
        let (broker, client) = setup(64);
        let attributes =
            MessageAttributes::new().with(RESERVED_ATTRIBUTE_NAME, MessageAttribute::number(9));
        let notification = SnsNotification::new("id", TOPIC, r#"{"s3Key":"k"}"#, &attributes);
        broker.enqueue_raw(QUEUE, notification.to_json().unwrap());

        let err = client
            .receive_message(QUEUE, 1, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtendedClientError::InvalidPointer(_)));
    }

    /// Object store whose deletes always fail; everything else goes to the broker.
    struct UndeletableStore(InMemoryBroker);

    fn denied() -> TransportError {
        aws_sdk_s3::error::BuildError::missing_field("key", "access denied").into()
    }

    #[async_trait::async_trait]
    impl ObjectStore for UndeletableStore {
        async fn put_text(
            &self,
            bucket: &str,
            key: &str,
            body: String,
        ) -> Result<(), TransportError> {
            self.0.put_text(bucket, key, body).await
        }

        async fn get_text(
            &self,
            bucket: &str,
            key: &str,
        ) -> Result<Option<String>, TransportError> {
            self.0.get_text(bucket, key).await
        }

        async fn delete(&self, _bucket: &str, _key: &str) -> Result<(), TransportError> {
            Err(denied())
        }

        async fn list(&self, bucket: &str) -> Result<Vec<StoredObject>, TransportError> {
            self.0.list(bucket).await
        }

        async fn delete_many(&self, _bucket: &str, _keys: &[String]) -> Result<(), TransportError> {
            Err(denied())
        }
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_message_on_queue() {
        let broker = InMemoryBroker::new();
        broker.subscribe(TOPIC, QUEUE, None);
        let mut storage = StorageConfig::new(BUCKET);
        storage.message_size_threshold = 64;
        let client = ExtendedClient::new(
            Arc::new(broker.clone()),
            Arc::new(broker.clone()),
            Arc::new(UndeletableStore(broker.clone())),
            &storage,
        );

        client
            .send_message(TOPIC, "z".repeat(500), event_type("x"), None, None)
            .await
            .unwrap();
        let received = client
            .receive_message(QUEUE, 1, Duration::ZERO)
            .await
            .unwrap();

        let result = client
            .delete_message(QUEUE, &received[0].receipt_handle, true)
            .await;

        assert!(matches!(result, Err(ExtendedClientError::Transport(_))));
        assert!(broker.deleted_receipts().is_empty());
        assert_eq!(broker.in_flight_len(), 1);
        assert_eq!(broker.object_count(BUCKET), 1);
    }

    #[tokio::test]
    async fn test_malformed_marked_handle_is_rejected() {
        let (broker, client) = setup(64);
        let err = client
            .delete_message(
                QUEUE,
                "-..s3BucketName..-b-..s3KeyOnly..--..s3Key..-k",
                true,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExtendedClientError::InvalidReceiptHandle(_)));
        assert!(broker.deleted_receipts().is_empty());
    }
}
