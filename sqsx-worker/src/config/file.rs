//! TOML file configuration structures.
//!
//! These structs directly map to the `sqsx-config.toml` file format.

use serde::{Deserialize, Serialize};
use sqsx_sdk::constants::DEFAULT_MESSAGE_SIZE_THRESHOLD;
use std::collections::HashMap;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub aws: AwsConfig,
    pub storage: StorageConfig,
    pub topics: TopicsConfig,
    /// Event name to `event_type` filter value.
    #[serde(default)]
    pub events: HashMap<String, String>,
    /// Queue code to queue settings.
    #[serde(default)]
    pub queues: HashMap<String, QueueConfig>,
}

/// AWS connection section. Anything left out falls back to the SDK's
/// default provider chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwsConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint, e.g. a localstack instance.
    pub endpoint_url: Option<Url>,
}

/// Overflow bucket section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    #[serde(default)]
    pub always_through_s3: bool,
    #[serde(default = "default_message_size_threshold")]
    pub message_size_threshold: usize,
}

fn default_message_size_threshold() -> usize {
    DEFAULT_MESSAGE_SIZE_THRESHOLD
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    pub topic_arn: String,
    pub fifo_topic_arn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// The `event_type` value this queue subscribes to.
    pub filter: String,
    pub queue_url: Option<Url>,
    /// Registered name of the handler.
    pub event_processor: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parsing() {
        let toml_str = r#"
[aws]
region = "eu-west-1"
endpoint_url = "http://localhost:4566"

[storage]
bucket = "queue-overflow"

[topics]
topic_arn = "arn:aws:sns:eu-west-1:000000000000:events"

[events]
order_created = "orders.created"

[queues.orders]
filter = "orders.created"
queue_url = "http://localhost:4566/000000000000/orders"
event_processor = "log"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
        assert!(config.aws.access_key_id.is_none());
        assert_eq!(config.storage.bucket, "queue-overflow");
        assert!(!config.storage.always_through_s3);
        assert_eq!(config.storage.message_size_threshold, 262_144);
        assert!(config.topics.fifo_topic_arn.is_none());
        assert_eq!(config.events["order_created"], "orders.created");
        assert_eq!(config.queues["orders"].event_processor, "log");
    }

    #[test]
    fn test_minimal_config_parsing() {
        let toml_str = r#"
[storage]
bucket = "queue-overflow"
always_through_s3 = true
message_size_threshold = 1024

[topics]
topic_arn = "arn:aws:sns:eu-west-1:000000000000:events"
fifo_topic_arn = "arn:aws:sns:eu-west-1:000000000000:events.fifo"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.storage.always_through_s3);
        assert_eq!(config.storage.message_size_threshold, 1024);
        assert!(config.events.is_empty());
        assert!(config.queues.is_empty());
    }

    #[test]
    fn test_invalid_queue_url_is_rejected() {
        let toml_str = r#"
[storage]
bucket = "queue-overflow"

[topics]
topic_arn = "arn:aws:sns:eu-west-1:000000000000:events"

[queues.orders]
filter = "orders.created"
queue_url = "not a url"
event_processor = "log"
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
