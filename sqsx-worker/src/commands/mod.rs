//! Subcommand implementations.
//!
//! Each takes already built clients so it can run against the in-memory
//! broker in tests.

pub mod clean_s3_queues;
pub mod dispatch;
pub mod filter_policy;
pub mod process_queue;
