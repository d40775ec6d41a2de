//! `dispatch <event_name> <data>`

use sqsx_core::client::{ExtendedClient, PublishReceipt};
use sqsx_core::config::RuntimeConfig;
use sqsx_core::events::{DispatchOptions, EventDispatcher};
use sqsx_sdk::objects::EventData;
use std::sync::Arc;

#[derive(clap::Args, Debug, Clone)]
pub struct DispatchArgs {
    pub event_name: String,

    /// Event body. JSON is published as JSON, anything else as plain text
    pub data: String,

    /// Publish to the FIFO topic
    #[arg(long)]
    pub fifo: bool,

    #[arg(long, requires = "fifo")]
    pub group_id: Option<String>,

    #[arg(long, requires = "fifo")]
    pub dedup_id: Option<String>,
}

pub fn parse_event_data(data: &str) -> EventData {
    match serde_json::from_str(data) {
        Ok(value) => EventData::Structured(value),
        Err(_) => EventData::Text(data.to_owned()),
    }
}

pub async fn execute(
    client: Arc<ExtendedClient>,
    config: &RuntimeConfig,
    args: &DispatchArgs,
) -> anyhow::Result<PublishReceipt> {
    let data = parse_event_data(&args.data);

    let receipt = if args.fifo {
        let dispatcher = EventDispatcher::fifo(client, &config.topics, config.events.clone())?;
        let options = DispatchOptions {
            message_group_id: args.group_id.clone(),
            message_deduplication_id: args.dedup_id.clone(),
        };
        dispatcher
            .dispatch_with(&args.event_name, data, options)
            .await?
    } else {
        let dispatcher = EventDispatcher::standard(client, &config.topics, config.events.clone());
        dispatcher.dispatch(&args.event_name, data).await?
    };

    Ok(receipt)
}
