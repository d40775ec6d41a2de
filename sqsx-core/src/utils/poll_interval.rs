use std::time::Duration;

/// Pause after a batch before polling again.
///
/// A non-empty batch suggests more messages are waiting, so the queue is
/// polled again almost immediately. An empty batch backs off to `idle`.
pub fn poll_interval(handled: usize, idle: Duration) -> Duration {
    if handled > 0 {
        Duration::from_millis(1)
    } else {
        idle
    }
}
