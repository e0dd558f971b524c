//! Daemonize the process. Must be called BEFORE the tokio runtime is created.
//!
//! The sequence is the classic double fork: fork and let the parent exit,
//! `setsid`, ignore SIGHUP, fork again and let the session leader exit, then
//! set the umask, move to a neutral directory and reclaim terminal
//! descriptors. The surviving grandchild is in a fresh session but is not its
//! leader, so opening a terminal later can never make it a controlling one.
//!
//! Calling this twice in one process forks twice more. That is unsupported and
//! not guarded against.

use std::path::{Path, PathBuf};

use tracing::Dispatch;

use super::ops::{ForkOutcome, ProcessOps, SystemOps};
use super::reclaim::reclaim_descriptors;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonStep};

/// File creation mask of the daemon: no group or other permissions.
pub const DEFAULT_UMASK: u32 = 0o077;

/// Working directory of the daemon.
pub const DEFAULT_WORKING_DIRECTORY: &str = "/";

/// Descriptors scanned when the hard limit is unlimited.
pub const DEFAULT_DESCRIPTOR_CEILING: u64 = 1024;

/// Where stdin, stdout and stderr end up.
pub const DEFAULT_NULL_DEVICE: &str = "/dev/null";

/// Convert the calling process into a daemon with the default settings.
///
/// Set `no_close` when the caller has already redirected its descriptors
/// (to log files, say) and wants to keep them. Only do that when none of them
/// refers to the terminal, or the daemon may be killed when that terminal
/// goes away.
///
/// Returns in the daemon process only; the original process and the
/// intermediate child exit with status 0. On platforms without `fork` this
/// logs a warning and returns `Ok(())` without doing anything.
///
/// # Errors
/// Returns [`DaemonError`] if any step fails.
pub fn daemonize(no_close: bool) -> Result<(), DaemonError> {
    Daemonizer::new().close_descriptors(!no_close).start()
}

/// Configurable daemonization. One-shot: [`start`](Self::start) consumes it.
pub struct Daemonizer<O = SystemOps> {
    ops: O,
    umask: u32,
    working_directory: PathBuf,
    close_descriptors: bool,
    descriptor_ceiling: u64,
    null_device: PathBuf,
    dispatch: Option<Dispatch>,
}

impl Daemonizer<SystemOps> {
    pub fn new() -> Self {
        Self::with_ops(SystemOps::default())
    }

    pub fn from_config(config: &DaemonConfig) -> Self {
        Self::new().configure(config)
    }
}

impl Default for Daemonizer<SystemOps> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: ProcessOps> Daemonizer<O> {
    /// Daemonize through `ops` instead of the platform's system calls.
    pub fn with_ops(ops: O) -> Self {
        Self {
            ops,
            umask: DEFAULT_UMASK,
            working_directory: PathBuf::from(DEFAULT_WORKING_DIRECTORY),
            close_descriptors: true,
            descriptor_ceiling: DEFAULT_DESCRIPTOR_CEILING,
            null_device: PathBuf::from(DEFAULT_NULL_DEVICE),
            dispatch: None,
        }
    }

    pub fn configure(self, config: &DaemonConfig) -> Self {
        self.umask(config.umask)
            .working_directory(&config.working_directory)
            .close_descriptors(config.close_descriptors)
            .descriptor_ceiling(config.descriptor_ceiling)
            .null_device(&config.null_device)
    }

    pub fn umask(mut self, mask: u32) -> Self {
        self.umask = mask;
        self
    }

    pub fn working_directory(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_directory = dir.as_ref().to_path_buf();
        self
    }

    /// Whether to close terminal descriptors and redirect stdio to the null
    /// device. On by default.
    pub fn close_descriptors(mut self, close: bool) -> Self {
        self.close_descriptors = close;
        self
    }

    pub fn descriptor_ceiling(mut self, ceiling: u64) -> Self {
        self.descriptor_ceiling = ceiling;
        self
    }

    pub fn null_device(mut self, path: impl AsRef<Path>) -> Self {
        self.null_device = path.as_ref().to_path_buf();
        self
    }

    /// Send this daemonizer's diagnostics to `dispatch` instead of the
    /// current default subscriber.
    ///
    /// Use a synchronous writer here. A subscriber that hands records to a
    /// background thread loses them after the fork, since only the forking
    /// thread survives.
    pub fn log_to(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Run the sequence. Returns only in the daemon.
    ///
    /// # Errors
    /// Returns [`DaemonError`] naming the step that failed.
    pub fn start(self) -> Result<(), DaemonError> {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, || self.run()),
            None => self.run(),
        }
    }

    fn run(&self) -> Result<(), DaemonError> {
        if !self.ops.supports_daemon() {
            tracing::warn!("Daemon is only supported on POSIX-compliant systems");
            return Ok(());
        }

        tracing::debug!("Daemonizing, PID {}", std::process::id());

        self.fork_and_exit_parent(DaemonStep::FirstFork)?;

        self.ops
            .create_session()
            .map_err(|e| DaemonError::new(DaemonStep::CreateSession, e))?;

        // A session leader's exit can send SIGHUP to its group; the second
        // fork below is exactly that.
        self.ops
            .ignore_hangup()
            .map_err(|e| DaemonError::new(DaemonStep::IgnoreHangup, e))?;

        self.fork_and_exit_parent(DaemonStep::SecondFork)?;

        self.ops.set_umask(self.umask);
        self.ops
            .change_dir(&self.working_directory)
            .map_err(|e| DaemonError::new(DaemonStep::ChangeDirectory, e))?;

        if self.close_descriptors {
            reclaim_descriptors(&self.ops, self.descriptor_ceiling, &self.null_device)?;
        }

        tracing::info!("Daemonized successfully, PID {}", std::process::id());
        Ok(())
    }

    fn fork_and_exit_parent(&self, step: DaemonStep) -> Result<(), DaemonError> {
        match self.ops.fork() {
            Ok(ForkOutcome::Child) => Ok(()),
            Ok(ForkOutcome::Parent(child)) => {
                tracing::debug!(child, "Forked, parent exiting");
                self.ops.exit_now(0)
            }
            Err(e) => Err(DaemonError::new(step, e)),
        }
    }
}
