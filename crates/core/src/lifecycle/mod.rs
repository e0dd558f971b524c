//! Process lifecycle: daemonization, descriptor reclamation, logging setup and
//! shutdown signals.

pub mod daemon;
pub mod logging;
pub mod ops;
pub mod reclaim;
pub mod signal;

#[cfg(test)]
pub(crate) mod testing;
