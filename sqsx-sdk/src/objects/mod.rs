pub mod attributes;
pub mod event_data;
pub mod filter_policy;
pub mod notification;
pub mod pointer;
pub mod receipt;

pub use attributes::{AttributeValue, MessageAttribute, MessageAttributes};
pub use event_data::EventData;
pub use filter_policy::FilterPolicy;
pub use notification::{NotificationAttribute, NotificationError, SnsNotification};
pub use pointer::PayloadPointer;
pub use receipt::{ReceiptHandle, ReceiptHandleError};
