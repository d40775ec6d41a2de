//! Configuration module for sqsx-worker.
//!
//! Handles loading configuration from the TOML file and converting it into
//! the runtime types of `sqsx-core`.

pub mod file;

use crate::config::file::{FileConfig, QueueConfig as FileQueueConfig};
use compact_str::CompactString;
use sqsx_core::config::{
    AwsConfig, EventsConfig, QueueConfig, QueuesConfig, RuntimeConfig, StorageConfig, TopicConfig,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Read, validate and convert the configuration file.
    pub fn load(&self) -> Result<RuntimeConfig, ConfigError> {
        let config_content =
            std::fs::read_to_string(&self.config_path).map_err(|source| ConfigError::IoError {
                path: self.config_path.clone(),
                source,
            })?;
        Self::parse(&config_content)
    }

    /// Validate and convert configuration text.
    pub fn parse(config_content: &str) -> Result<RuntimeConfig, ConfigError> {
        let file_config: FileConfig = toml::from_str(config_content)?;
        validate(&file_config)?;
        Ok(build_runtime_config(file_config))
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.aws.access_key_id.is_some() != config.aws.secret_access_key.is_some() {
        return Err(ConfigError::ValidationError(
            "aws.access_key_id and aws.secret_access_key must be set together".into(),
        ));
    }
    if config.storage.bucket.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "storage.bucket cannot be empty".into(),
        ));
    }
    if config.storage.message_size_threshold == 0 {
        return Err(ConfigError::ValidationError(
            "storage.message_size_threshold must be greater than zero".into(),
        ));
    }
    if config.topics.topic_arn.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "topics.topic_arn cannot be empty".into(),
        ));
    }
    for (code, queue) in &config.queues {
        if queue.filter.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "queue {code} has an empty filter"
            )));
        }
        if queue.event_processor.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "queue {code} has no event_processor"
            )));
        }
    }
    Ok(())
}

fn build_runtime_config(file_config: FileConfig) -> RuntimeConfig {
    let events = file_config
        .events
        .into_iter()
        .map(|(name, filter)| (CompactString::from(name), CompactString::from(filter)))
        .collect();

    let queues: QueuesConfig = file_config
        .queues
        .into_iter()
        .map(|(code, queue)| (CompactString::from(code), convert_queue(queue)))
        .collect();

    RuntimeConfig {
        aws: AwsConfig {
            access_key_id: file_config.aws.access_key_id,
            secret_access_key: file_config.aws.secret_access_key,
            region: file_config.aws.region,
            endpoint_url: file_config.aws.endpoint_url,
        },
        storage: StorageConfig {
            bucket: file_config.storage.bucket,
            always_through_s3: file_config.storage.always_through_s3,
            message_size_threshold: file_config.storage.message_size_threshold,
        },
        topics: TopicConfig {
            topic_arn: file_config.topics.topic_arn,
            fifo_topic_arn: file_config.topics.fifo_topic_arn,
        },
        events: EventsConfig::new(events),
        queues,
    }
}

fn convert_queue(q: FileQueueConfig) -> QueueConfig {
    QueueConfig {
        filter: q.filter.into(),
        queue_url: q.queue_url,
        event_processor: q.event_processor.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"
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

[queues.audit]
filter = "audit"
event_processor = "log"
"#;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();

        let config = ConfigLoader::new(file.path()).load().unwrap();
        assert_eq!(config.storage.bucket, "queue-overflow");
        assert_eq!(config.events.filter_for("order_created"), "orders.created");
        assert_eq!(config.queues.len(), 2);
        assert!(config.queues["orders"].queue_url.is_some());
        assert!(config.queues["audit"].queue_url.is_none());
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new("/nonexistent/sqsx-config.toml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
    }

    #[test]
    fn test_half_static_credentials_rejected() {
        let content = format!("[aws]\naccess_key_id = \"AKIA\"\n{VALID}");
        let err = ConfigLoader::parse(&content).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_empty_bucket_rejected() {
        let content = VALID.replace("queue-overflow", "");
        let err = ConfigLoader::parse(&content).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("bucket")));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let content = VALID.replace(
            "bucket = \"queue-overflow\"",
            "bucket = \"queue-overflow\"\nmessage_size_threshold = 0",
        );
        assert!(ConfigLoader::parse(&content).is_err());
    }
}
