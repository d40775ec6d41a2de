//! `clean-s3-queues [--keep-days N]`

use sqsx_core::processors::{CleanupReport, StorageCleaner};
use sqsx_core::transport::ObjectStore;
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(clap::Args, Debug, Clone)]
pub struct CleanS3QueuesArgs {
    /// Keep objects modified within this many days
    #[arg(short = 'k', long, default_value_t = 3)]
    pub keep_days: u32,
}

pub async fn execute(
    store: Arc<dyn ObjectStore>,
    bucket: &str,
    args: &CleanS3QueuesArgs,
) -> anyhow::Result<CleanupReport> {
    let cleaner = StorageCleaner::new(store, bucket);
    let report = cleaner.clean(args.keep_days, OffsetDateTime::now_utc()).await?;
    Ok(report)
}
