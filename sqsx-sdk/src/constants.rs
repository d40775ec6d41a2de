//! Limits and reserved names of the extended-payload protocol.

/// Messages (body plus attributes) above this many bytes are stored in S3.
pub const DEFAULT_MESSAGE_SIZE_THRESHOLD: usize = 262_144;

/// SQS allows 10 attributes; one is reserved for the payload size marker.
pub const MAX_ALLOWED_ATTRIBUTES: usize = 10 - 1;

/// Attribute set on offloaded messages, holding the original body size.
pub const RESERVED_ATTRIBUTE_NAME: &str = "SQSLargePayloadSize";

/// Delimits the bucket name embedded in a receipt handle.
pub const S3_BUCKET_NAME_MARKER: &str = "-..s3BucketName..-";

/// Delimits the object key embedded in a receipt handle.
pub const S3_KEY_MARKER: &str = "-..s3Key..-";

/// Attribute carrying the event name; subscriptions filter on it.
pub const EVENT_TYPE_ATTRIBUTE: &str = "event_type";

/// Attribute added to resolved messages whose body came from S3.
pub const S3_KEY_ATTRIBUTE: &str = "s3_key";

/// Attribute added to resolved messages whose body came from S3.
pub const S3_BUCKET_NAME_ATTRIBUTE: &str = "s3_bucket_name";

/// Largest batch a single SQS receive call may return.
pub const MAX_RECEIVE_BATCH: u8 = 10;
