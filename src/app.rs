//! Application struct that resolves settings up front, then runs the
//! placeholder workload.

use crate::cli::RunArgs;
use anyhow::Context;
use detach_core::Daemonizer;
use detach_core::config::Config;
use detach_core::lifecycle::signal::SignalHandler;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Log directory used when neither the CLI nor the config names one,
/// relative to the launch directory.
const DEFAULT_LOG_DIR: &str = "logs";

/// Descriptors described in the report: stdio plus a few inherited slots.
#[cfg(unix)]
const REPORT_LAST_FD: i32 = 7;

pub struct Application {
    config: Config,
    log_level: String,
    log_dir: PathBuf,
    report: Option<PathBuf>,
    duration: Duration,
}

impl Application {
    /// Build the application from CLI args: load config, apply overrides and
    /// make every path absolute. Daemonizing changes the working directory,
    /// so nothing relative may survive past this point.
    pub fn build(args: &RunArgs) -> anyhow::Result<Self> {
        let config = Config::load_or_default(&args.config);

        let log_level = args
            .log_level
            .clone()
            .unwrap_or_else(|| config.log_level.clone());
        let log_dir = args
            .log_dir
            .clone()
            .or_else(|| config.log_dir.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));
        let log_dir = std::path::absolute(&log_dir).context("cannot resolve log directory")?;
        let report = args
            .report
            .as_deref()
            .map(std::path::absolute)
            .transpose()
            .context("cannot resolve report path")?;
        let duration = Duration::from_secs(args.duration.unwrap_or(config.work.duration_secs));

        Ok(Self {
            config,
            log_level,
            log_dir,
            report,
            duration,
        })
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn logging_to_file(&self) -> bool {
        self.config.logging_to_file
    }

    /// The daemonizer for this configuration; `no_close` wins over the
    /// config file.
    pub fn daemonizer(&self, no_close: bool) -> Daemonizer {
        let daemonizer = Daemonizer::from_config(&self.config.daemon);
        if no_close {
            daemonizer.close_descriptors(false)
        } else {
            daemonizer
        }
    }

    /// Write the process snapshot, if one was requested.
    #[cfg(unix)]
    pub fn write_report(&self) -> anyhow::Result<()> {
        if let Some(path) = &self.report {
            let snapshot = detach_core::process::ProcessSnapshot::capture(REPORT_LAST_FD)?;
            snapshot.write_json(path)?;
            tracing::debug!("Wrote process report to {}", path.display());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn write_report(&self) -> anyhow::Result<()> {
        if self.report.is_some() {
            tracing::warn!("Process reports are only supported on Unix systems");
        }
        Ok(())
    }

    /// Run the workload: wait out the configured duration or a shutdown
    /// signal, whichever comes first.
    pub async fn serve(self) -> anyhow::Result<()> {
        tracing::info!(
            "Workload running, PID {}, for up to {}s",
            std::process::id(),
            self.duration.as_secs()
        );

        let (signal_handler, mut shutdown_rx) = SignalHandler::new();
        tokio::spawn(async move {
            if let Err(e) = signal_handler.run().await {
                tracing::error!("Signal handler failed: {e}");
            }
        });

        tokio::select! {
            _ = tokio::time::sleep(self.duration) => {
                tracing::info!("Workload finished");
            }
            _ = shutdown_rx.wait_for(|v| *v) => {
                tracing::info!("Workload interrupted");
            }
        }

        tracing::info!("Exiting, PID {}", std::process::id());
        Ok(())
    }
}
