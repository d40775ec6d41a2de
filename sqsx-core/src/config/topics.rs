//! Topic configuration.

/// The SNS topics events are published to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    pub topic_arn: String,
    /// FIFO topic used by the FIFO dispatcher, if any.
    pub fifo_topic_arn: Option<String>,
}
