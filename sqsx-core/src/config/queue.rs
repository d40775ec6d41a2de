//! Per-queue configuration.

use compact_str::CompactString;
use sqsx_sdk::objects::FilterPolicy;
use std::collections::HashMap;
use url::Url;

/// One drainable queue, keyed by its queue code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// `event_type` value the queue's subscription accepts.
    pub filter: CompactString,
    /// May be left out while the queue is only used to render its filter policy.
    pub queue_url: Option<Url>,
    /// Name of the handler in the processor registry.
    pub event_processor: CompactString,
}

impl QueueConfig {
    /// Filter policy to attach to the queue's topic subscription.
    pub fn filter_policy(&self) -> FilterPolicy {
        FilterPolicy::new([self.filter.as_str()])
    }
}

/// Queues by queue code.
pub type QueuesConfig = HashMap<CompactString, QueueConfig>;
