//! Close terminal descriptors and point stdio at the null device.

use std::path::Path;

use super::ops::{Fd, ProcessOps, STDERR_FD, STDIN_FD};
use crate::error::{DaemonError, DaemonStep};

/// Close every terminal-backed descriptor below the hard descriptor limit
/// (or below `ceiling` when the limit is unlimited), then make descriptors
/// 0, 1 and 2 refer to `null_device`.
///
/// Non-terminal descriptors above 2 (log files, sockets, pipes) are left
/// alone. A failed close is logged and skipped; failing to query the limit,
/// open the null device or duplicate it is an error.
pub fn reclaim_descriptors<O: ProcessOps + ?Sized>(
    ops: &O,
    ceiling: u64,
    null_device: &Path,
) -> Result<(), DaemonError> {
    let limit = ops
        .descriptor_limit()
        .map_err(|e| DaemonError::new(DaemonStep::QueryDescriptorLimit, e))?;
    let bound = limit.scan_bound(ceiling);

    let mut closed = 0usize;
    for fd in 0..bound {
        if !ops.is_terminal(fd) {
            continue;
        }
        match ops.close(fd) {
            Ok(()) => closed += 1,
            Err(e) => tracing::info!(fd, "Could not close terminal descriptor: {e}"),
        }
    }
    tracing::debug!(bound, closed, "Closed terminal descriptors");

    let null = ops
        .open_read_write(null_device)
        .map_err(|e| DaemonError::new(DaemonStep::OpenNullDevice, e))?;
    redirect_stdio(ops, null)?;

    // Descriptor 0 was still held by a non-terminal, so the null device
    // landed higher. Its copies are in place; drop the extra handle.
    if null > STDERR_FD {
        if let Err(e) = ops.close(null) {
            tracing::info!(fd = null, "Could not close spare null device handle: {e}");
        }
    }
    Ok(())
}

fn redirect_stdio<O: ProcessOps + ?Sized>(ops: &O, null: Fd) -> Result<(), DaemonError> {
    for target in STDIN_FD..=STDERR_FD {
        if target == null {
            continue;
        }
        ops.duplicate_onto(null, target)
            .map_err(|e| DaemonError::new(DaemonStep::RedirectStdio, e))?;
    }
    Ok(())
}
