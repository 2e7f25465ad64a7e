//! Signal handling for graceful shutdown.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Wait for SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!(message = "Signal received.", signal = "SIGINT");
        }
        _ = sigterm.recv() => {
            info!(message = "Signal received.", signal = "SIGTERM");
        }
    }
    Ok(())
}

/// Wait for Ctrl-C.
#[cfg(not(unix))]
pub async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!(message = "Signal received.", signal = "ctrl-c");
    Ok(())
}

/// Cancel `shutdown` when a termination signal arrives.
pub fn spawn_shutdown_listener(shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            result = shutdown_signal() => match result {
                Ok(()) => {
                    info!("Shutdown requested, finishing current work");
                    shutdown.cancel();
                }
                Err(e) => error!("Failed to install signal handlers: {}", e),
            },
        }
    })
}
