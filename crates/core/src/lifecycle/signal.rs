//! Shutdown signal handling (SIGTERM/SIGINT) for the daemon's workload.
//!
//! SIGHUP is deliberately absent: the daemonizer sets it to ignored and the
//! workload keeps that disposition.

use tokio::sync::watch;

/// A signal handler that listens for OS signals and dispatches shutdown.
pub struct SignalHandler {
    shutdown_tx: watch::Sender<bool>,
}

impl SignalHandler {
    /// Create a new signal handler and a receiver that becomes `true` on shutdown.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    /// Run the signal loop. Resolves once a shutdown signal is received.
    ///
    /// - SIGTERM / SIGINT / Ctrl+C → triggers shutdown
    pub async fn run(self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigterm = signal(SignalKind::terminate())?;

            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    tracing::info!("Received SIGINT, initiating shutdown...");
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating shutdown...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }

        let _ = self.shutdown_tx.send(true);
        Ok(())
    }
}
