use clap::Parser;
use sqsx_core::processors::ProcessorRegistry;
use sqsx_worker::Args;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    tracing::info!("Starting sqsx-worker v{}", env!("CARGO_PKG_VERSION"));

    sqsx_worker::run(args, ProcessorRegistry::with_builtin())
        .await
        .map_err(|e| {
            tracing::error!("{:#}", e);
            e
        })
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,aws_config=warn,aws_smithy_runtime=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
