//! The handler contract and the registry that names handlers.

use super::log_processor::LogEventProcessor;
use async_trait::async_trait;
use compact_str::CompactString;
use serde_json::Value;
use sqsx_sdk::objects::MessageAttributes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Everything a handler is constructed with.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    /// The body decoded as JSON, or a JSON string holding the raw text
    /// when the body is not JSON.
    pub data: Value,
    pub attributes: MessageAttributes,
    pub queue_code: CompactString,
    pub event_type: CompactString,
    pub message_id: String,
}

/// Handles one event.
///
/// Returning an error stops the queue run; the message is left on the
/// queue and redelivered after its visibility timeout.
#[async_trait]
pub trait EventProcessor: Send {
    async fn execute(&mut self) -> anyhow::Result<()>;
}

pub type ProcessorFactory = Arc<dyn Fn(EventPayload) -> Box<dyn EventProcessor> + Send + Sync>;

/// Handler constructors keyed by the name queues refer to them with.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    factories: HashMap<CompactString, ProcessorFactory>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the handlers shipped with the crate (`log`).
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_type::<LogEventProcessor>(LogEventProcessor::NAME);
        registry
    }

    /// Register a constructor under `name`, replacing any previous one.
    pub fn register<F, P>(&mut self, name: impl Into<CompactString>, factory: F) -> &mut Self
    where
        F: Fn(EventPayload) -> P + Send + Sync + 'static,
        P: EventProcessor + 'static,
    {
        self.factories.insert(
            name.into(),
            Arc::new(move |payload| Box::new(factory(payload)) as Box<dyn EventProcessor>),
        );
        self
    }

    /// Register a handler type built with `From<EventPayload>`.
    pub fn register_type<P>(&mut self, name: impl Into<CompactString>) -> &mut Self
    where
        P: EventProcessor + From<EventPayload> + 'static,
    {
        self.register(name, |payload: EventPayload| P::from(payload))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(CompactString::as_str)
    }

    /// Build the handler registered under `name`.
    pub fn build(&self, name: &str, payload: EventPayload) -> Option<Box<dyn EventProcessor>> {
        self.factories.get(name).map(|factory| factory(payload))
    }
}

impl fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ProcessorRegistry")
            .field("processors", &names)
            .finish()
    }
}
