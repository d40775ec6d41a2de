//! Built-in handler that logs each event and does nothing else.

use super::event_processor::{EventPayload, EventProcessor};
use async_trait::async_trait;
use tracing::info;

pub struct LogEventProcessor {
    payload: EventPayload,
}

impl LogEventProcessor {
    pub const NAME: &'static str = "log";
}

impl From<EventPayload> for LogEventProcessor {
    fn from(payload: EventPayload) -> Self {
        Self { payload }
    }
}

#[async_trait]
impl EventProcessor for LogEventProcessor {
    async fn execute(&mut self) -> anyhow::Result<()> {
        let attributes: Vec<&str> = self
            .payload
            .attributes
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        info!(
            queue_code = %self.payload.queue_code,
            event_type = %self.payload.event_type,
            message_id = %self.payload.message_id,
            attributes = ?attributes,
            data = %self.payload.data,
            "Received event"
        );
        Ok(())
    }
}
