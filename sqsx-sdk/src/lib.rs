//! Wire types shared by the sqsx publisher and queue worker.
//!
//! Everything in here describes data as it travels through SNS, SQS and
//! S3: message attributes, the notification envelope SNS wraps around
//! queue deliveries, the pointer left behind when a body is offloaded, and
//! the receipt handle that remembers where that body lives.

pub mod constants;
pub mod objects;
