//! In-process broker implementing all three transport traits.
//!
//! Publishing fans a message out to every queue subscribed to the topic
//! whose filter policy matches, wrapped in the same notification envelope
//! SNS produces. Received messages stay in flight until deleted, and
//! [`InMemoryBroker::expire_in_flight`] makes them visible again, like an
//! elapsed visibility timeout.

use super::{
    ObjectStore, PublishOutput, PublishRequest, QueueConsumer, RawQueueMessage, StoredObject,
    TopicPublisher, TransportError,
};
use async_trait::async_trait;
use sqsx_sdk::objects::{FilterPolicy, SnsNotification};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Subscription {
    topic_arn: String,
    queue_url: String,
    policy: Option<FilterPolicy>,
}

#[derive(Debug, Clone)]
struct QueuedMessage {
    message_id: String,
    body: String,
}

#[derive(Debug, Clone)]
struct Object {
    body: String,
    last_modified: OffsetDateTime,
}

#[derive(Debug, Default)]
struct BrokerState {
    subscriptions: Vec<Subscription>,
    queues: HashMap<String, VecDeque<QueuedMessage>>,
    /// Receipt handle -> (queue url, message)
    in_flight: HashMap<String, (String, QueuedMessage)>,
    buckets: HashMap<String, BTreeMap<String, Object>>,
    published: Vec<PublishRequest>,
    deleted_receipts: Vec<String>,
}

/// Shared in-memory SNS + SQS + S3.
///
/// Clones share state, so one clone can be handed to the code under test
/// while another inspects the result.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe a queue to a topic. `None` accepts every message.
    pub fn subscribe(
        &self,
        topic_arn: impl Into<String>,
        queue_url: impl Into<String>,
        policy: Option<FilterPolicy>,
    ) {
        let queue_url = queue_url.into();
        let mut state = self.lock();
        state.queues.entry(queue_url.clone()).or_default();
        state.subscriptions.push(Subscription {
            topic_arn: topic_arn.into(),
            queue_url,
            policy,
        });
    }

    /// Put a raw body straight onto a queue, bypassing the topic.
    pub fn enqueue_raw(&self, queue_url: &str, body: impl Into<String>) {
        let message = QueuedMessage {
            message_id: Uuid::new_v4().to_string(),
            body: body.into(),
        };
        self.lock()
            .queues
            .entry(queue_url.to_owned())
            .or_default()
            .push_back(message);
    }

    /// Store an object with an explicit modification time.
    pub fn put_object_at(
        &self,
        bucket: &str,
        key: &str,
        body: impl Into<String>,
        last_modified: OffsetDateTime,
    ) {
        self.lock()
            .buckets
            .entry(bucket.to_owned())
            .or_default()
            .insert(
                key.to_owned(),
                Object {
                    body: body.into(),
                    last_modified,
                },
            );
    }

    /// Messages waiting to be received.
    pub fn queue_len(&self, queue_url: &str) -> usize {
        self.lock().queues.get(queue_url).map_or(0, VecDeque::len)
    }

    /// Messages received but neither deleted nor expired.
    pub fn in_flight_len(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Return every in-flight message to the front of its queue.
    pub fn expire_in_flight(&self) {
        let mut state = self.lock();
        let in_flight: Vec<_> = state.in_flight.drain().collect();
        for (_, (queue_url, message)) in in_flight {
            state.queues.entry(queue_url).or_default().push_front(message);
        }
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.lock().buckets.get(bucket).map_or(0, BTreeMap::len)
    }

    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every publish request seen so far, in order.
    pub fn published(&self) -> Vec<PublishRequest> {
        self.lock().published.clone()
    }

    /// Receipt handles passed to successful deletes, in order.
    pub fn deleted_receipts(&self) -> Vec<String> {
        self.lock().deleted_receipts.clone()
    }
}

#[async_trait]
impl TopicPublisher for InMemoryBroker {
    async fn publish(&self, request: PublishRequest) -> Result<PublishOutput, TransportError> {
        let message_id = Uuid::new_v4().to_string();
        let mut notification = SnsNotification::new(
            message_id.clone(),
            request.topic_arn.clone(),
            request.message.clone(),
            &request.attributes,
        );
        if let Ok(timestamp) = OffsetDateTime::now_utc().format(&Rfc3339) {
            notification = notification.with_timestamp(timestamp);
        }
        let body = notification.to_json()?;

        let sequence_number = request
            .message_group_id
            .as_ref()
            .map(|_| format!("{:020}", self.lock().published.len() + 1));

        let mut state = self.lock();
        let targets: Vec<String> = state
            .subscriptions
            .iter()
            .filter(|s| s.topic_arn == request.topic_arn)
            .filter(|s| {
                s.policy
                    .as_ref()
                    .is_none_or(|policy| policy.matches(&request.attributes))
            })
            .map(|s| s.queue_url.clone())
            .collect();

        for queue_url in targets {
            state
                .queues
                .entry(queue_url)
                .or_default()
                .push_back(QueuedMessage {
                    message_id: message_id.clone(),
                    body: body.clone(),
                });
        }
        state.published.push(request);

        Ok(PublishOutput {
            message_id: Some(message_id),
            sequence_number,
        })
    }
}

#[async_trait]
impl QueueConsumer for InMemoryBroker {
    async fn receive(
        &self,
        queue_url: &str,
        max_messages: u8,
        _wait_time: Duration,
    ) -> Result<Vec<RawQueueMessage>, TransportError> {
        let mut state = self.lock();
        let queue = state
            .queues
            .get_mut(queue_url)
            .ok_or_else(|| TransportError::QueueNotFound(queue_url.to_owned()))?;

        let take = usize::from(max_messages).min(queue.len());
        let batch: Vec<QueuedMessage> = queue.drain(..take).collect();

        let mut received = Vec::with_capacity(batch.len());
        for message in batch {
            let receipt_handle = Uuid::new_v4().simple().to_string();
            received.push(RawQueueMessage {
                message_id: Some(message.message_id.clone()),
                body: message.body.clone(),
                receipt_handle: receipt_handle.clone(),
            });
            state
                .in_flight
                .insert(receipt_handle, (queue_url.to_owned(), message));
        }
        Ok(received)
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        match state.in_flight.get(receipt_handle) {
            Some((owner, _)) if owner == queue_url => {
                state.in_flight.remove(receipt_handle);
                state.deleted_receipts.push(receipt_handle.to_owned());
                Ok(())
            }
            _ => Err(TransportError::InvalidReceiptHandle(
                receipt_handle.to_owned(),
            )),
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryBroker {
    async fn put_text(&self, bucket: &str, key: &str, body: String) -> Result<(), TransportError> {
        self.put_object_at(bucket, key, body, OffsetDateTime::now_utc());
        Ok(())
    }

    async fn get_text(&self, bucket: &str, key: &str) -> Result<Option<String>, TransportError> {
        Ok(self
            .lock()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.body.clone()))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), TransportError> {
        if let Some(objects) = self.lock().buckets.get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    async fn list(&self, bucket: &str) -> Result<Vec<StoredObject>, TransportError> {
        Ok(self
            .lock()
            .buckets
            .get(bucket)
            .map(|objects| {
                objects
                    .iter()
                    .map(|(key, object)| StoredObject {
                        key: key.clone(),
                        last_modified: Some(object.last_modified),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_many(&self, bucket: &str, keys: &[String]) -> Result<(), TransportError> {
        if let Some(objects) = self.lock().buckets.get_mut(bucket) {
            for key in keys {
                objects.remove(key);
            }
        }
        Ok(())
    }
}
