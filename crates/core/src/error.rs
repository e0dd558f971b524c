use std::fmt;
use std::io;

/// The step of the daemonization sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonStep {
    FirstFork,
    CreateSession,
    IgnoreHangup,
    SecondFork,
    ChangeDirectory,
    QueryDescriptorLimit,
    OpenNullDevice,
    RedirectStdio,
}

impl fmt::Display for DaemonStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::FirstFork => "cannot fork (first fork)",
            Self::CreateSession => "cannot create a new session",
            Self::IgnoreHangup => "cannot ignore SIGHUP",
            Self::SecondFork => "cannot fork (second fork)",
            Self::ChangeDirectory => "cannot change working directory",
            Self::QueryDescriptorLimit => "cannot query the open file descriptor limit",
            Self::OpenNullDevice => "cannot open the null device",
            Self::RedirectStdio => "cannot redirect standard descriptors",
        };
        f.write_str(text)
    }
}

/// Daemonization failed. This is the only error the daemonizer reports; the
/// failing step and the OS error are kept for diagnostics.
///
/// No rollback happens: by the time most steps can fail the process has
/// already forked, so the caller decides whether to exit.
#[derive(Debug, thiserror::Error)]
#[error("error during daemonizing: {step}: {source}")]
pub struct DaemonError {
    step: DaemonStep,
    #[source]
    source: io::Error,
}

impl DaemonError {
    pub(crate) fn new(step: DaemonStep, source: io::Error) -> Self {
        Self { step, source }
    }

    pub fn step(&self) -> DaemonStep {
        self.step
    }

    /// The OS error code of the underlying failure, if there was one.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.source.raw_os_error()
    }
}
