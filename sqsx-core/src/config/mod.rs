//! Runtime configuration types.
//!
//! These are the validated values the publisher and the queue worker run
//! with. Reading and checking the TOML file is done by the worker crate.

mod aws;
mod events;
mod queue;
mod storage;
mod topics;

pub use aws::AwsConfig;
pub use events::EventsConfig;
pub use queue::{QueueConfig, QueuesConfig};
pub use storage::StorageConfig;
pub use topics::TopicConfig;

/// Everything needed to dispatch events and drain queues.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub aws: AwsConfig,
    pub storage: StorageConfig,
    pub topics: TopicConfig,
    pub events: EventsConfig,
    pub queues: QueuesConfig,
}
