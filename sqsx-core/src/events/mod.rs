//! Producer side: turning named events into topic publishes.
//!
//! # Event Flow
//!
//! 1. Application code calls `EventDispatcher::dispatch(name, data)`
//! 2. The body is encoded, tagged with the `event_type` attribute and sent
//!    through the `ExtendedClient` (offloading to S3 when large)
//! 3. SNS fans the message out to every queue whose filter matches
//! 4. `QueueProcessor` drains a queue and hands each event to its handler

pub mod dispatcher;

pub use dispatcher::{DispatchError, DispatchOptions, EventDispatcher, OutgoingEvent};
