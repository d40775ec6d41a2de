//! sqsx worker
//!
//! Command line front end for publishing events and draining SNS/SQS
//! queues. Binaries that ship their own handlers call [`run`] with a
//! registry holding them; `sqsx-worker` itself only knows the built-in
//! `log` handler.

pub mod commands;
pub mod config;
pub mod lock;
pub mod shutdown;

use clap::{Parser, Subcommand};
use commands::clean_s3_queues::CleanS3QueuesArgs;
use commands::dispatch::DispatchArgs;
use commands::filter_policy::FilterPolicyArgs;
use commands::process_queue::ProcessQueueArgs;
use config::ConfigLoader;
use sqsx_core::client::ExtendedClient;
use sqsx_core::config::RuntimeConfig;
use sqsx_core::processors::ProcessorRegistry;
use sqsx_core::transport::{AwsTransport, ObjectStore};
use std::path::PathBuf;
use std::sync::Arc;

/// Publish events through SNS and drain SQS queues, offloading large bodies to S3
#[derive(Parser, Debug)]
#[command(name = "sqsx-worker")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the configuration file
    #[arg(
        short,
        long,
        env = "SQSX_CONFIG",
        default_value = "./sqsx-config.toml",
        global = true
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drain a configured queue into its event processor
    ProcessQueue(ProcessQueueArgs),
    /// Delete offloaded message bodies older than the retention window
    #[command(name = "clean-s3-queues")]
    CleanS3Queues(CleanS3QueuesArgs),
    /// Print the subscription filter policy of a configured queue
    FilterPolicy(FilterPolicyArgs),
    /// Publish one event
    Dispatch(DispatchArgs),
}

/// Load the configuration and run the selected command.
pub async fn run(args: Args, registry: ProcessorRegistry) -> anyhow::Result<()> {
    let config = ConfigLoader::new(&args.config).load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    match args.command {
        Command::FilterPolicy(cmd) => {
            println!("{}", commands::filter_policy::render(&config.queues, &cmd)?);
        }
        Command::ProcessQueue(cmd) => {
            let (client, _) = connect(&config).await;
            let shutdown_rx = shutdown::spawn_shutdown_listener();
            commands::process_queue::execute(
                client,
                Arc::new(registry),
                &config.queues,
                &cmd,
                shutdown_rx,
            )
            .await?;
        }
        Command::CleanS3Queues(cmd) => {
            let (_, store) = connect(&config).await;
            commands::clean_s3_queues::execute(store, &config.storage.bucket, &cmd).await?;
        }
        Command::Dispatch(cmd) => {
            let (client, _) = connect(&config).await;
            let receipt = commands::dispatch::execute(client, &config, &cmd).await?;
            if let Some(message_id) = receipt.message_id {
                println!("{message_id}");
            }
        }
    }

    Ok(())
}

/// Build the extended client and the object store from the AWS settings.
async fn connect(config: &RuntimeConfig) -> (Arc<ExtendedClient>, Arc<dyn ObjectStore>) {
    let transport = AwsTransport::load(&config.aws).await;
    let store: Arc<dyn ObjectStore> = transport.store;
    let client = ExtendedClient::new(
        transport.publisher,
        transport.consumer,
        store.clone(),
        &config.storage,
    );
    (Arc::new(client), store)
}
