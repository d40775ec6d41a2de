//! Consumer side processors.
//!
//! - `QueueProcessor`: drains one configured queue, building the queue's
//!   `EventProcessor` for every message and deleting it once handled
//! - `ProcessorRegistry`: handler constructors by name
//! - `LogEventProcessor`: built-in handler that only logs
//! - `StorageCleaner`: removes stale offloaded bodies from the bucket

pub mod event_processor;
pub mod log_processor;
pub mod queue_processor;
pub mod storage_cleaner;

pub use event_processor::{EventPayload, EventProcessor, ProcessorFactory, ProcessorRegistry};
pub use log_processor::LogEventProcessor;
pub use queue_processor::{
    QueueProcessor, QueueProcessorError, QueueProcessorOptions, RunSummary, StopReason,
};
pub use storage_cleaner::{CleanupError, CleanupReport, StorageCleaner};
