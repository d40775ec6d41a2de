//! EventDispatcher.
//!
//! Publishes an event's data to the configured topic under its event
//! name. Errors from the transport surface unchanged; nothing is retried.

use crate::client::{ExtendedClient, ExtendedClientError, PublishReceipt};
use crate::config::{EventsConfig, TopicConfig};
use compact_str::CompactString;
use kanau::processor::Processor;
use sqsx_sdk::constants::EVENT_TYPE_ATTRIBUTE;
use sqsx_sdk::objects::{EventData, MessageAttribute, MessageAttributes};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to serialize event data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Client(#[from] ExtendedClientError),

    #[error("no fifo topic configured")]
    FifoTopicNotConfigured,
}

/// Extra publish parameters, only meaningful for FIFO topics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    pub message_group_id: Option<String>,
    pub message_deduplication_id: Option<String>,
}

/// An event on its way to the topic.
#[derive(Debug, Clone)]
pub struct OutgoingEvent {
    pub name: CompactString,
    pub data: EventData,
    pub options: DispatchOptions,
}

impl OutgoingEvent {
    pub fn new(name: impl Into<CompactString>, data: impl Into<EventData>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            options: DispatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }
}

/// Publishes events to one topic.
#[derive(Clone)]
pub struct EventDispatcher {
    client: Arc<ExtendedClient>,
    topic_arn: String,
    events: Arc<EventsConfig>,
}

impl EventDispatcher {
    pub fn new(
        client: Arc<ExtendedClient>,
        topic_arn: impl Into<String>,
        events: EventsConfig,
    ) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
            events: Arc::new(events),
        }
    }

    /// Dispatcher for the standard topic.
    pub fn standard(
        client: Arc<ExtendedClient>,
        topics: &TopicConfig,
        events: EventsConfig,
    ) -> Self {
        Self::new(client, topics.topic_arn.clone(), events)
    }

    /// Dispatcher for the FIFO topic.
    pub fn fifo(
        client: Arc<ExtendedClient>,
        topics: &TopicConfig,
        events: EventsConfig,
    ) -> Result<Self, DispatchError> {
        let topic_arn = topics
            .fifo_topic_arn
            .clone()
            .ok_or(DispatchError::FifoTopicNotConfigured)?;
        Ok(Self::new(client, topic_arn, events))
    }

    /// Publish `event_data` under `event_name`.
    pub async fn dispatch(
        &self,
        event_name: &str,
        event_data: impl Into<EventData>,
    ) -> Result<PublishReceipt, DispatchError> {
        self.process(OutgoingEvent::new(event_name, event_data)).await
    }

    /// Publish with FIFO group and deduplication ids.
    pub async fn dispatch_with(
        &self,
        event_name: &str,
        event_data: impl Into<EventData>,
        options: DispatchOptions,
    ) -> Result<PublishReceipt, DispatchError> {
        self.process(OutgoingEvent::new(event_name, event_data).with_options(options))
            .await
    }
}

impl Processor<OutgoingEvent> for EventDispatcher {
    type Output = PublishReceipt;
    type Error = DispatchError;

    #[tracing::instrument(
        skip_all,
        err,
        name = "SNS:DispatchEvent",
        fields(event_name = %event.name)
    )]
    async fn process(&self, event: OutgoingEvent) -> Result<PublishReceipt, DispatchError> {
        let event_type = self.events.filter_for(&event.name);
        let attributes = MessageAttributes::new()
            .with(EVENT_TYPE_ATTRIBUTE, MessageAttribute::string(event_type));
        let body = event.data.into_body()?;

        debug!(
            event_name = %event.name,
            event_type,
            topic_arn = %self.topic_arn,
            size = body.len(),
            "Dispatching event"
        );

        let receipt = self
            .client
            .send_message(
                &self.topic_arn,
                body,
                attributes,
                event.options.message_group_id,
                event.options.message_deduplication_id,
            )
            .await?;

        info!(
            event_name = %event.name,
            message_id = ?receipt.message_id,
            offloaded = receipt.offloaded.is_some(),
            "Event dispatched"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::transport::InMemoryBroker;
    use serde_json::json;
    use sqsx_sdk::objects::PayloadPointer;
    use std::collections::HashMap;

    const TOPIC: &str = "arn:aws:sns:local:000000000000:events";
    const FIFO_TOPIC: &str = "arn:aws:sns:local:000000000000:events.fifo";

    fn topics() -> TopicConfig {
        TopicConfig {
            topic_arn: TOPIC.into(),
            fifo_topic_arn: Some(FIFO_TOPIC.into()),
        }
    }

    fn dispatcher(broker: &InMemoryBroker, threshold: usize) -> EventDispatcher {
        let mut storage = StorageConfig::new("overflow");
        storage.message_size_threshold = threshold;
        let client = Arc::new(ExtendedClient::in_memory(broker, &storage));
        EventDispatcher::standard(client, &topics(), EventsConfig::default())
    }

    #[tokio::test]
    async fn test_dispatch_publishes_event_name_and_json_body() {
        let broker = InMemoryBroker::new();
        let dispatcher = dispatcher(&broker, 262_144);

        dispatcher
            .dispatch("order_created", json!({"id": 42, "lines": [1, 2]}))
            .await
            .unwrap();

        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic_arn, TOPIC);
        assert_eq!(
            published[0].attributes.get_str(EVENT_TYPE_ATTRIBUTE),
            Some("order_created")
        );
        let body: serde_json::Value = serde_json::from_str(&published[0].message).unwrap();
        assert_eq!(body, json!({"id": 42, "lines": [1, 2]}));
    }

    #[tokio::test]
    async fn test_dispatch_list_and_text() {
        let broker = InMemoryBroker::new();
        let dispatcher = dispatcher(&broker, 262_144);

        dispatcher.dispatch("rows", vec![json!(1), json!("two")]).await.unwrap();
        dispatcher.dispatch("raw", "id,name\n1,a").await.unwrap();

        let published = broker.published();
        assert_eq!(published[0].message, r#"[1,"two"]"#);
        assert_eq!(published[1].message, "id,name\n1,a");
    }

    #[tokio::test]
    async fn test_event_name_is_mapped_to_filter_value() {
        let broker = InMemoryBroker::new();
        let client = Arc::new(ExtendedClient::in_memory(&broker, &StorageConfig::new("overflow")));
        let events = EventsConfig::new(HashMap::from([(
            CompactString::from("order_created"),
            CompactString::from("orders.created"),
        )]));
        let dispatcher = EventDispatcher::standard(client, &topics(), events);

        dispatcher.dispatch("order_created", json!({})).await.unwrap();
        assert_eq!(
            broker.published()[0].attributes.get_str(EVENT_TYPE_ATTRIBUTE),
            Some("orders.created")
        );
    }

    #[tokio::test]
    async fn test_large_event_is_offloaded() {
        let broker = InMemoryBroker::new();
        let dispatcher = dispatcher(&broker, 128);

        let receipt = dispatcher
            .dispatch("bulk", json!({"blob": "q".repeat(1024)}))
            .await
            .unwrap();

        assert!(receipt.offloaded.is_some());
        let published = &broker.published()[0];
        assert!(PayloadPointer::parse(&published.message).is_ok());
        assert_eq!(broker.object_count("overflow"), 1);
    }

    #[tokio::test]
    async fn test_fifo_dispatcher() {
        let broker = InMemoryBroker::new();
        let client = Arc::new(ExtendedClient::in_memory(&broker, &StorageConfig::new("overflow")));
        let dispatcher = EventDispatcher::fifo(client, &topics(), EventsConfig::default()).unwrap();

        dispatcher
            .dispatch_with(
                "order_created",
                json!({"id": 1}),
                DispatchOptions {
                    message_group_id: Some("orders".into()),
                    message_deduplication_id: Some("order-1".into()),
                },
            )
            .await
            .unwrap();

        let published = &broker.published()[0];
        assert_eq!(published.topic_arn, FIFO_TOPIC);
        assert_eq!(published.message_group_id.as_deref(), Some("orders"));
    }

    #[test]
    fn test_fifo_dispatcher_requires_fifo_topic() {
        let broker = InMemoryBroker::new();
        let client = Arc::new(ExtendedClient::in_memory(&broker, &StorageConfig::new("overflow")));
        let topics = TopicConfig {
            topic_arn: TOPIC.into(),
            fifo_topic_arn: None,
        };
        assert!(matches!(
            EventDispatcher::fifo(client, &topics, EventsConfig::default()),
            Err(DispatchError::FifoTopicNotConfigured)
        ));
    }
}
