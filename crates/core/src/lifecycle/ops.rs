//! The system calls the daemonization sequence is built from.
//!
//! [`Daemonizer`](super::daemon::Daemonizer) never touches `libc` directly; it
//! goes through [`ProcessOps`], so the ordering of the sequence can be checked
//! without forking the test process.

use std::io;
use std::path::Path;

/// A raw descriptor number. A plain integer so the seam also exists on
/// targets without `std::os::fd`.
pub type Fd = i32;

pub const STDIN_FD: Fd = 0;
pub const STDERR_FD: Fd = 2;

/// Which side of a `fork` the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkOutcome {
    Parent(i32),
    Child,
}

/// The hard limit on open file descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorLimit {
    Finite(u64),
    Unlimited,
}

impl DescriptorLimit {
    /// Number of descriptors to scan, falling back to `ceiling` when the
    /// limit is unlimited.
    pub fn scan_bound(self, ceiling: u64) -> Fd {
        let bound = match self {
            Self::Finite(limit) => limit,
            Self::Unlimited => ceiling,
        };
        bound.min(Fd::MAX as u64) as Fd
    }
}

/// Process-level operations used while daemonizing.
pub trait ProcessOps {
    /// Whether this platform can daemonize at all.
    fn supports_daemon(&self) -> bool;

    /// Fork the calling process.
    fn fork(&self) -> io::Result<ForkOutcome>;

    /// Terminate immediately, skipping exit handlers and buffered-output
    /// flushing. Used by the branches of a fork that must not run any of the
    /// embedding application's cleanup.
    fn exit_now(&self, status: i32) -> !;

    /// Become session and process-group leader, dropping the controlling terminal.
    fn create_session(&self) -> io::Result<()>;

    fn ignore_hangup(&self) -> io::Result<()>;

    /// Set the file creation mask, returning the previous one.
    fn set_umask(&self, mask: u32) -> u32;

    fn change_dir(&self, dir: &Path) -> io::Result<()>;

    fn descriptor_limit(&self) -> io::Result<DescriptorLimit>;

    fn is_terminal(&self, fd: Fd) -> bool;

    fn close(&self, fd: Fd) -> io::Result<()>;

    /// Open `path` read-write. The kernel hands out the lowest free descriptor.
    fn open_read_write(&self, path: &Path) -> io::Result<Fd>;

    /// Make `dst` refer to the same open file as `src`.
    fn duplicate_onto(&self, src: Fd, dst: Fd) -> io::Result<()>;
}

impl<T: ProcessOps + ?Sized> ProcessOps for &T {
    fn supports_daemon(&self) -> bool {
        (**self).supports_daemon()
    }

    fn fork(&self) -> io::Result<ForkOutcome> {
        (**self).fork()
    }

    fn exit_now(&self, status: i32) -> ! {
        (**self).exit_now(status)
    }

    fn create_session(&self) -> io::Result<()> {
        (**self).create_session()
    }

    fn ignore_hangup(&self) -> io::Result<()> {
        (**self).ignore_hangup()
    }

    fn set_umask(&self, mask: u32) -> u32 {
        (**self).set_umask(mask)
    }

    fn change_dir(&self, dir: &Path) -> io::Result<()> {
        (**self).change_dir(dir)
    }

    fn descriptor_limit(&self) -> io::Result<DescriptorLimit> {
        (**self).descriptor_limit()
    }

    fn is_terminal(&self, fd: Fd) -> bool {
        (**self).is_terminal(fd)
    }

    fn close(&self, fd: Fd) -> io::Result<()> {
        (**self).close(fd)
    }

    fn open_read_write(&self, path: &Path) -> io::Result<Fd> {
        (**self).open_read_write(path)
    }

    fn duplicate_onto(&self, src: Fd, dst: Fd) -> io::Result<()> {
        (**self).duplicate_onto(src, dst)
    }
}

/// [`ProcessOps`] for the platform this crate was built for.
#[cfg(unix)]
pub type SystemOps = PosixOps;

#[cfg(not(unix))]
pub type SystemOps = UnsupportedOps;

/// POSIX implementation on top of `libc`.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixOps;

#[cfg(unix)]
fn check(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

#[cfg(unix)]
impl ProcessOps for PosixOps {
    fn supports_daemon(&self) -> bool {
        true
    }

    fn fork(&self) -> io::Result<ForkOutcome> {
        // SAFETY: the child only continues on the forking thread, and the
        // daemonizer documents that it must run before other threads start.
        match check(unsafe { libc::fork() })? {
            0 => Ok(ForkOutcome::Child),
            pid => Ok(ForkOutcome::Parent(pid)),
        }
    }

    fn exit_now(&self, status: i32) -> ! {
        // SAFETY: `_exit` is async-signal-safe and never returns.
        unsafe { libc::_exit(status) }
    }

    fn create_session(&self) -> io::Result<()> {
        // SAFETY: setsid takes no arguments and only changes process state.
        check(unsafe { libc::setsid() })?;
        Ok(())
    }

    fn ignore_hangup(&self) -> io::Result<()> {
        // SAFETY: SIG_IGN installs no handler code, so nothing runs in
        // signal context.
        let previous = unsafe { libc::signal(libc::SIGHUP, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn set_umask(&self, mask: u32) -> u32 {
        // SAFETY: umask cannot fail and touches no memory.
        unsafe { libc::umask(mask as libc::mode_t) as u32 }
    }

    fn change_dir(&self, dir: &Path) -> io::Result<()> {
        std::env::set_current_dir(dir)
    }

    fn descriptor_limit(&self) -> io::Result<DescriptorLimit> {
        let mut limit = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: `limit` is a valid, exclusively borrowed rlimit for the call.
        check(unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) })?;
        if limit.rlim_max == libc::RLIM_INFINITY {
            Ok(DescriptorLimit::Unlimited)
        } else {
            Ok(DescriptorLimit::Finite(limit.rlim_max as u64))
        }
    }

    fn is_terminal(&self, fd: Fd) -> bool {
        // SAFETY: isatty only inspects the descriptor; a closed or invalid
        // one yields 0.
        unsafe { libc::isatty(fd) == 1 }
    }

    fn close(&self, fd: Fd) -> io::Result<()> {
        // SAFETY: callers pass descriptors they are giving up; no Rust owner
        // (File, OwnedFd) is left holding them.
        check(unsafe { libc::close(fd) })?;
        Ok(())
    }

    fn open_read_write(&self, path: &Path) -> io::Result<Fd> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let path = CString::new(path.as_os_str().as_bytes())
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;
        // Plain open(2) rather than std::fs: std sets O_CLOEXEC, and the null
        // device usually lands on descriptor 0, which must survive exec.
        // SAFETY: `path` is a NUL-terminated string that outlives the call.
        check(unsafe { libc::open(path.as_ptr(), libc::O_RDWR) })
    }

    fn duplicate_onto(&self, src: Fd, dst: Fd) -> io::Result<()> {
        // SAFETY: dup2 only rewrites the descriptor table; `dst` is a stdio
        // slot the daemonizer owns at this point.
        check(unsafe { libc::dup2(src, dst) })?;
        Ok(())
    }
}

/// Stand-in for platforms without fork/setsid. Only
/// [`supports_daemon`](ProcessOps::supports_daemon) is meaningful; the
/// daemonizer stops before calling anything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedOps;

fn unsupported<T>() -> io::Result<T> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

impl ProcessOps for UnsupportedOps {
    fn supports_daemon(&self) -> bool {
        false
    }

    fn fork(&self) -> io::Result<ForkOutcome> {
        unsupported()
    }

    /// Never called: without a fork there is no parent branch to end.
    fn exit_now(&self, status: i32) -> ! {
        unreachable!("exit_now({status}) on a platform without fork")
    }

    fn create_session(&self) -> io::Result<()> {
        unsupported()
    }

    fn ignore_hangup(&self) -> io::Result<()> {
        unsupported()
    }

    fn set_umask(&self, _mask: u32) -> u32 {
        0
    }

    fn change_dir(&self, _dir: &Path) -> io::Result<()> {
        unsupported()
    }

    fn descriptor_limit(&self) -> io::Result<DescriptorLimit> {
        unsupported()
    }

    fn is_terminal(&self, _fd: Fd) -> bool {
        false
    }

    fn close(&self, _fd: Fd) -> io::Result<()> {
        unsupported()
    }

    fn open_read_write(&self, _path: &Path) -> io::Result<Fd> {
        unsupported()
    }

    fn duplicate_onto(&self, _src: Fd, _dst: Fd) -> io::Result<()> {
        unsupported()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_bound_uses_ceiling_when_unlimited() {
        assert_eq!(DescriptorLimit::Unlimited.scan_bound(1024), 1024);
        assert_eq!(DescriptorLimit::Finite(256).scan_bound(1024), 256);
    }

    #[test]
    fn test_scan_bound_clamps_huge_limits() {
        assert_eq!(DescriptorLimit::Finite(u64::MAX).scan_bound(1024), Fd::MAX);
    }

    #[test]
    fn test_unsupported_ops_refuse() {
        let ops = UnsupportedOps;
        assert!(!ops.supports_daemon());
        assert_eq!(ops.fork().unwrap_err().kind(), io::ErrorKind::Unsupported);
        assert!(!ops.is_terminal(0));
    }

    #[test]
    #[should_panic(expected = "platform without fork")]
    fn test_unsupported_ops_never_exit() {
        UnsupportedOps.exit_now(0);
    }

    #[cfg(unix)]
    #[test]
    fn test_posix_descriptor_limit_is_readable() {
        let limit = PosixOps.descriptor_limit().unwrap();
        if let DescriptorLimit::Finite(n) = limit {
            assert!(n > 2);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_posix_open_and_duplicate() {
        let ops = PosixOps;
        let fd = ops.open_read_write(Path::new("/dev/null")).unwrap();
        assert!(fd >= 0);
        assert!(!ops.is_terminal(fd));
        // dup2 onto itself is a validity check that leaves the table alone.
        ops.duplicate_onto(fd, fd).unwrap();
        ops.close(fd).unwrap();
    }
}
