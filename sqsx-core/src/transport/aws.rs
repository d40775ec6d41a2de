//! AWS SDK implementations of the transport traits.

use super::{
    ObjectStore, PublishOutput, PublishRequest, QueueConsumer, RawQueueMessage, StoredObject,
    TopicPublisher, TransportError,
};
use crate::config::AwsConfig;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_sns::primitives::Blob;
use aws_sdk_sns::types::MessageAttributeValue;
use bytes::Bytes;
use sqsx_sdk::objects::{AttributeValue, MessageAttribute};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, warn};

/// SQS rejects long polls longer than this.
const MAX_WAIT_TIME_SECONDS: i32 = 20;

/// Load the shared SDK configuration.
///
/// Static credentials, region and endpoint are applied when configured;
/// everything else comes from the default provider chain.
pub async fn load_sdk_config(config: &AwsConfig) -> SdkConfig {
    debug!(
        region = ?config.region,
        endpoint_url = ?config.endpoint_url.as_ref().map(|url| url.as_str()),
        static_credentials = config.has_static_credentials(),
        "Loading AWS configuration"
    );

    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }

    if let (Some(access_key_id), Some(secret_access_key)) =
        (&config.access_key_id, &config.secret_access_key)
    {
        loader = loader.credentials_provider(Credentials::new(
            access_key_id.clone(),
            secret_access_key.clone(),
            None,
            None,
            "sqsx-config",
        ));
    }

    if let Some(endpoint_url) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint_url.as_str());
    }

    loader.load().await
}

/// The three AWS-backed transports built from one SDK configuration.
#[derive(Clone)]
pub struct AwsTransport {
    pub publisher: Arc<SnsPublisher>,
    pub consumer: Arc<SqsConsumer>,
    pub store: Arc<S3Store>,
}

impl AwsTransport {
    pub async fn load(config: &AwsConfig) -> Self {
        let sdk_config = load_sdk_config(config).await;
        Self::from_sdk_config(&sdk_config, config.endpoint_url.is_some())
    }

    /// Custom endpoints (localstack, minio) need path-style bucket addressing.
    pub fn from_sdk_config(sdk_config: &SdkConfig, force_path_style: bool) -> Self {
        let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(force_path_style)
            .build();

        Self {
            publisher: Arc::new(SnsPublisher::new(aws_sdk_sns::Client::new(sdk_config))),
            consumer: Arc::new(SqsConsumer::new(aws_sdk_sqs::Client::new(sdk_config))),
            store: Arc::new(S3Store::new(aws_sdk_s3::Client::from_conf(s3_config))),
        }
    }
}

// ---------------------------------------------------------------------------
// SNS
// ---------------------------------------------------------------------------

pub struct SnsPublisher {
    client: aws_sdk_sns::Client,
}

impl SnsPublisher {
    pub fn new(client: aws_sdk_sns::Client) -> Self {
        Self { client }
    }
}

fn to_sns_attribute(
    attribute: MessageAttribute,
) -> Result<MessageAttributeValue, aws_sdk_sns::error::BuildError> {
    let builder = MessageAttributeValue::builder().data_type(attribute.data_type);
    let builder = match attribute.value {
        AttributeValue::String(value) => builder.string_value(value),
        AttributeValue::Binary(value) => builder.binary_value(Blob::new(value)),
    };
    builder.build()
}

#[async_trait]
impl TopicPublisher for SnsPublisher {
    async fn publish(&self, request: PublishRequest) -> Result<PublishOutput, TransportError> {
        let mut call = self
            .client
            .publish()
            .topic_arn(request.topic_arn)
            .message(request.message)
            .set_message_group_id(request.message_group_id)
            .set_message_deduplication_id(request.message_deduplication_id);

        for (name, attribute) in request.attributes {
            call = call.message_attributes(name, to_sns_attribute(attribute)?);
        }

        let output = call.send().await.map_err(aws_sdk_sns::Error::from)?;

        Ok(PublishOutput {
            message_id: output.message_id().map(str::to_owned),
            sequence_number: output.sequence_number().map(str::to_owned),
        })
    }
}

// ---------------------------------------------------------------------------
// SQS
// ---------------------------------------------------------------------------

pub struct SqsConsumer {
    client: aws_sdk_sqs::Client,
}

impl SqsConsumer {
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueueConsumer for SqsConsumer {
    async fn receive(
        &self,
        queue_url: &str,
        max_messages: u8,
        wait_time: Duration,
    ) -> Result<Vec<RawQueueMessage>, TransportError> {
        let wait_time_seconds = i32::try_from(wait_time.as_secs())
            .unwrap_or(MAX_WAIT_TIME_SECONDS)
            .min(MAX_WAIT_TIME_SECONDS);

        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(i32::from(max_messages))
            .wait_time_seconds(wait_time_seconds)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(aws_sdk_sqs::Error::from)?;

        let mut messages = Vec::with_capacity(output.messages().len());
        for message in output.messages() {
            let (Some(body), Some(receipt_handle)) = (message.body(), message.receipt_handle())
            else {
                warn!(
                    message_id = ?message.message_id(),
                    "Skipping SQS message without body or receipt handle"
                );
                continue;
            };
            messages.push(RawQueueMessage {
                message_id: message.message_id().map(str::to_owned),
                body: body.to_owned(),
                receipt_handle: receipt_handle.to_owned(),
            });
        }

        debug!(queue_url, count = messages.len(), "Received SQS messages");
        Ok(messages)
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), TransportError> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(aws_sdk_sqs::Error::from)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// S3
// ---------------------------------------------------------------------------

pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_text(&self, bucket: &str, key: &str, body: String) -> Result<(), TransportError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("text/plain; charset=utf-8")
            .body(ByteStream::from(body.into_bytes()))
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;
        Ok(())
    }

    async fn get_text(&self, bucket: &str, key: &str) -> Result<Option<String>, TransportError> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(GetObjectError::is_no_such_key) => {
                return Ok(None);
            }
            Err(err) => return Err(aws_sdk_s3::Error::from(err).into()),
        };

        let bytes: Bytes = output.body.collect().await?.into_bytes();
        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|_| TransportError::InvalidUtf8 {
                key: key.to_owned(),
            })
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), TransportError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;
        Ok(())
    }

    async fn list(&self, bucket: &str) -> Result<Vec<StoredObject>, TransportError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(aws_sdk_s3::Error::from)?;

            for object in output.contents() {
                let Some(key) = object.key() else { continue };
                objects.push(StoredObject {
                    key: key.to_owned(),
                    last_modified: object
                        .last_modified()
                        .and_then(|at| OffsetDateTime::from_unix_timestamp(at.secs()).ok()),
                });
            }

            match output.next_continuation_token() {
                Some(token) => continuation_token = Some(token.to_owned()),
                None => break,
            }
        }

        Ok(objects)
    }

    async fn delete_many(&self, bucket: &str, keys: &[String]) -> Result<(), TransportError> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()?;
        let delete = Delete::builder().set_objects(Some(objects)).build()?;

        self.client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;

        debug!(bucket, count = keys.len(), "Deleted S3 objects");
        Ok(())
    }
}
