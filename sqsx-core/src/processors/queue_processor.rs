//! QueueProcessor.
//!
//! The QueueProcessor is responsible for:
//! - Receiving batches from one configured queue through the extended client
//! - Building the queue's `EventProcessor` for each message and executing it
//! - Deleting each message (and optionally its S3 body) once handled
//! - Stopping on the shutdown signal or after `exit_after`
//!
//! A handler error ends the run. The failing message is not deleted and
//! reappears after its visibility timeout.

use super::event_processor::{EventPayload, ProcessorRegistry};
use crate::client::{ExtendedClient, ExtendedClientError, ReceivedMessage};
use crate::config::QueuesConfig;
use crate::utils::poll_interval::poll_interval;
use compact_str::CompactString;
use kanau::processor::Processor;
use sqsx_sdk::constants::{EVENT_TYPE_ATTRIBUTE, MAX_RECEIVE_BATCH};
use sqsx_sdk::objects::EventData;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum QueueProcessorError {
    #[error("queue {0} is not configured")]
    UnknownQueue(CompactString),

    #[error("queue {0} has no queue url")]
    MissingQueueUrl(CompactString),

    #[error("event processor {name} for queue {queue_code} is not registered")]
    UnknownProcessor {
        queue_code: CompactString,
        name: CompactString,
    },

    #[error("max number of messages must be between 1 and 10, got {0}")]
    InvalidBatchSize(u8),

    #[error(transparent)]
    Client(#[from] ExtendedClientError),

    #[error("message {message_id} has no event_type attribute")]
    MissingEventType { message_id: String },

    #[error("event processor failed on message {message_id}: {source}")]
    Handler {
        message_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueProcessorOptions {
    /// Pause after an empty batch.
    pub default_sleep: Duration,
    /// Stop once this much time has passed since the run started.
    pub exit_after: Duration,
    /// Delete offloaded bodies from S3 together with their messages.
    pub flush_s3: bool,
    pub max_number_of_messages: u8,
    /// Long poll duration of each receive.
    pub wait_time: Duration,
}

impl Default for QueueProcessorOptions {
    fn default() -> Self {
        Self {
            default_sleep: Duration::from_millis(200),
            exit_after: Duration::from_secs(100),
            flush_s3: false,
            max_number_of_messages: MAX_RECEIVE_BATCH,
            wait_time: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    ExitAfterElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: u64,
    pub messages: u64,
    pub stop_reason: StopReason,
}

/// Drains one queue into its configured handler.
pub struct QueueProcessor {
    client: Arc<ExtendedClient>,
    registry: Arc<ProcessorRegistry>,
    queue_code: CompactString,
    queue_url: String,
    processor_name: CompactString,
    options: QueueProcessorOptions,
}

impl QueueProcessor {
    /// Resolve `queue_code` against the configured queues.
    ///
    /// Fails before anything is received when the queue, its url or its
    /// handler is unknown.
    pub fn new(
        client: Arc<ExtendedClient>,
        registry: Arc<ProcessorRegistry>,
        queues: &QueuesConfig,
        queue_code: &str,
        options: QueueProcessorOptions,
    ) -> Result<Self, QueueProcessorError> {
        let queue = queues
            .get(queue_code)
            .ok_or_else(|| QueueProcessorError::UnknownQueue(queue_code.into()))?;

        let queue_url = queue
            .queue_url
            .as_ref()
            .ok_or_else(|| QueueProcessorError::MissingQueueUrl(queue_code.into()))?;
        if !registry.contains(&queue.event_processor) {
            return Err(QueueProcessorError::UnknownProcessor {
                queue_code: queue_code.into(),
                name: queue.event_processor.clone(),
            });
        }
        if !(1..=MAX_RECEIVE_BATCH).contains(&options.max_number_of_messages) {
            return Err(QueueProcessorError::InvalidBatchSize(
                options.max_number_of_messages,
            ));
        }

        Ok(Self {
            client,
            registry,
            queue_code: queue_code.into(),
            queue_url: queue_url.to_string(),
            processor_name: queue.event_processor.clone(),
            options,
        })
    }

    async fn receive_batch(&self) -> Result<Vec<ReceivedMessage>, QueueProcessorError> {
        let messages = self
            .client
            .receive_message(
                &self.queue_url,
                self.options.max_number_of_messages,
                self.options.wait_time,
            )
            .await?;
        Ok(messages)
    }

    async fn handle_batch(
        &self,
        messages: Vec<ReceivedMessage>,
    ) -> Result<usize, QueueProcessorError> {
        let count = messages.len();
        for message in messages {
            self.process(message).await?;
        }
        Ok(count)
    }

    /// Receive one batch and handle it. Returns how many messages were handled.
    pub async fn drain_once(&self) -> Result<usize, QueueProcessorError> {
        let messages = self.receive_batch().await?;
        self.handle_batch(messages).await
    }

    /// Drain until shutdown is signalled or `exit_after` has passed.
    ///
    /// Shutdown interrupts a pending receive or sleep, never a handler.
    pub async fn run(
        &self,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<RunSummary, QueueProcessorError> {
        info!(
            queue_code = %self.queue_code,
            processor = %self.processor_name,
            exit_after_secs = self.options.exit_after.as_secs_f64(),
            "QueueProcessor started"
        );

        let started = Instant::now();
        let mut batches = 0u64;
        let mut handled = 0u64;

        let stop_reason = loop {
            if *shutdown_rx.borrow() {
                break StopReason::Shutdown;
            }
            if started.elapsed() > self.options.exit_after {
                break StopReason::ExitAfterElapsed;
            }

            let messages = tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break StopReason::Shutdown;
                    }
                    continue;
                }

                messages = self.receive_batch() => messages?,
            };

            let count = self.handle_batch(messages).await.inspect_err(|e| {
                error!(queue_code = %self.queue_code, error = %e, "Stopping queue processing");
            })?;
            batches += 1;
            handled += count as u64;

            let pause = poll_interval(count, self.options.default_sleep);
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break StopReason::Shutdown;
                    }
                }

                _ = tokio::time::sleep(pause) => {}
            }
        };

        info!(
            queue_code = %self.queue_code,
            batches,
            messages = handled,
            reason = ?stop_reason,
            "QueueProcessor stopped"
        );

        Ok(RunSummary {
            batches,
            messages: handled,
            stop_reason,
        })
    }
}

impl Processor<ReceivedMessage> for QueueProcessor {
    type Output = ();
    type Error = QueueProcessorError;
    #[tracing::instrument(
        skip_all,
        err,
        name = "SQS:HandleMessage",
        fields(message_id = %message.message_id)
    )]
    async fn process(&self, message: ReceivedMessage) -> Result<(), QueueProcessorError> {
        let event_type: CompactString = message
            .attributes
            .get_str(EVENT_TYPE_ATTRIBUTE)
            .ok_or_else(|| QueueProcessorError::MissingEventType {
                message_id: message.message_id.clone(),
            })?
            .into();

        let payload = EventPayload {
            data: EventData::decode(&message.body),
            attributes: message.attributes,
            queue_code: self.queue_code.clone(),
            event_type,
            message_id: message.message_id.clone(),
        };

        let mut handler = self
            .registry
            .build(&self.processor_name, payload)
            .ok_or_else(|| QueueProcessorError::UnknownProcessor {
                queue_code: self.queue_code.clone(),
                name: self.processor_name.clone(),
            })?;

        handler
            .execute()
            .await
            .map_err(|source| QueueProcessorError::Handler {
                message_id: message.message_id.clone(),
                source: source.into(),
            })?;

        self.client
            .delete_message(
                &self.queue_url,
                &message.receipt_handle,
                self.options.flush_s3,
            )
            .await?;

        debug!(message_id = %message.message_id, "Message handled and deleted");
        Ok(())
    }
}
