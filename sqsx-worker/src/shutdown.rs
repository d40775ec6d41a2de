//! Signal handling for graceful shutdown.

use tokio::sync::watch;

/// Completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
#[cfg(unix)]
pub async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, finishing the current batch");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, finishing the current batch");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C, finishing the current batch");
    Ok(())
}

/// Spawns a task that flips the returned flag to `true` on the first
/// shutdown signal.
pub fn spawn_shutdown_listener() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            tracing::error!("Failed to install signal handlers: {}", e);
            // keep the sender alive so receivers do not read this as shutdown
            shutdown_tx.closed().await;
            return;
        }
        let _ = shutdown_tx.send(true);
    });

    shutdown_rx
}
