//! Turn the calling process into a detached, session-less background daemon.
//!
//! The entry point is [`daemonize`] (or the [`Daemonizer`] builder for
//! non-default settings). Everything else in this crate supports it: the
//! system-call seam in [`lifecycle::ops`], the YAML configuration in
//! [`config`], and the read-only [`process::ProcessSnapshot`] used to inspect
//! the result.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod process;

pub use error::{DaemonError, DaemonStep};
pub use lifecycle::daemon::{Daemonizer, daemonize};
