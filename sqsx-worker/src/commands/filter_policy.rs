//! `filter-policy <queue_code>`

use anyhow::Context;
use sqsx_core::config::QueuesConfig;

#[derive(clap::Args, Debug, Clone)]
pub struct FilterPolicyArgs {
    /// Queue code from the `[queues]` table
    pub queue_code: String,
}

/// The JSON filter policy to attach to the queue's topic subscription.
pub fn render(queues: &QueuesConfig, args: &FilterPolicyArgs) -> anyhow::Result<String> {
    let queue = queues
        .get(args.queue_code.as_str())
        .with_context(|| format!("queue {} is not configured", args.queue_code))?;
    Ok(queue.filter_policy().to_json()?)
}
