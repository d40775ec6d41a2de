//! `process-queue <queue_code>`

use crate::lock::DrainLock;
use anyhow::Context;
use sqsx_core::client::ExtendedClient;
use sqsx_core::config::QueuesConfig;
use sqsx_core::processors::{ProcessorRegistry, QueueProcessor, QueueProcessorOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(clap::Args, Debug, Clone)]
pub struct ProcessQueueArgs {
    /// Queue code from the `[queues]` table
    pub queue_code: String,

    /// Seconds to sleep after an empty batch
    #[arg(short = 's', long, default_value_t = 0.2)]
    pub default_sleep: f64,

    /// Stop after this many seconds
    #[arg(short = 'e', long, default_value_t = 100)]
    pub exit_after_seconds: u64,

    /// Delete offloaded bodies from S3 together with their messages
    #[arg(short = 'f', long)]
    pub flush_s3: bool,

    /// Messages per receive
    #[arg(
        short = 'm',
        long,
        default_value_t = 10,
        value_parser = clap::value_parser!(u8).range(1..=10)
    )]
    pub max_number_of_messages: u8,

    /// Long poll duration of each receive
    #[arg(
        short = 'w',
        long,
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(0..=20)
    )]
    pub wait_time_seconds: u64,

    /// Receive and handle a single batch, then exit
    #[arg(long)]
    pub once: bool,

    /// Refuse to start while another run holds this lock file
    #[arg(long)]
    pub lock_file: Option<PathBuf>,
}

impl ProcessQueueArgs {
    pub fn options(&self) -> anyhow::Result<QueueProcessorOptions> {
        let default_sleep = Duration::try_from_secs_f64(self.default_sleep)
            .with_context(|| format!("invalid --default-sleep {}", self.default_sleep))?;
        Ok(QueueProcessorOptions {
            default_sleep,
            exit_after: Duration::from_secs(self.exit_after_seconds),
            flush_s3: self.flush_s3,
            max_number_of_messages: self.max_number_of_messages,
            wait_time: Duration::from_secs(self.wait_time_seconds),
        })
    }

    /// A held lock older than this belongs to a run that did not clean up.
    fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.exit_after_seconds.saturating_mul(2).max(60))
    }
}

/// Returns the number of messages handled.
pub async fn execute(
    client: Arc<ExtendedClient>,
    registry: Arc<ProcessorRegistry>,
    queues: &QueuesConfig,
    args: &ProcessQueueArgs,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<u64> {
    let options = args.options()?;
    let processor = QueueProcessor::new(client, registry, queues, &args.queue_code, options)?;

    let _lock = args
        .lock_file
        .as_ref()
        .map(|path| DrainLock::acquire(path, args.lock_stale_after()))
        .transpose()?;

    if args.once {
        let handled = processor.drain_once().await?;
        tracing::info!(queue_code = %args.queue_code, handled, "Single batch processed");
        return Ok(handled as u64);
    }

    let summary = processor.run(shutdown_rx).await?;
    Ok(summary.messages)
}
