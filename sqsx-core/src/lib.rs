#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod events;
pub mod processors;
pub mod transport;
pub mod utils;
