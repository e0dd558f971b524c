//! Read-only view of the process attributes daemonization changes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What one descriptor slot looked like at capture time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorInfo {
    pub fd: i32,
    pub open: bool,
    pub terminal: bool,
    /// Path the descriptor resolves to, where the platform exposes it.
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub ppid: i32,
    pub sid: i32,
    pub pgid: i32,
    pub umask: u32,
    pub cwd: PathBuf,
    pub descriptors: Vec<DescriptorInfo>,
}

impl ProcessSnapshot {
    /// A session leader's pid equals its session id.
    pub fn is_session_leader(&self) -> bool {
        i64::from(self.sid) == i64::from(self.pid)
    }

    pub fn descriptor(&self, fd: i32) -> Option<&DescriptorInfo> {
        self.descriptors.iter().find(|d| d.fd == fd)
    }

    /// Write as JSON. The file appears atomically (write then rename), so a
    /// reader polling for it never sees partial content.
    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read(path)?;
        Ok(serde_json::from_slice(&contents)?)
    }
}

#[cfg(unix)]
impl ProcessSnapshot {
    /// Capture the current process, describing descriptors `0..=last_fd`.
    ///
    /// Reading the umask means setting it and putting it back, so another
    /// thread creating files at the same moment could see the temporary value.
    pub fn capture(last_fd: i32) -> std::io::Result<Self> {
        // SAFETY: plain getters; umask is restored immediately.
        let (ppid, sid, pgid, umask) = unsafe {
            let old = libc::umask(0o077);
            libc::umask(old);
            (
                libc::getppid(),
                libc::getsid(0),
                libc::getpgrp(),
                old as u32,
            )
        };
        let descriptors = (0..=last_fd).map(describe).collect();

        Ok(Self {
            pid: std::process::id(),
            ppid,
            sid,
            pgid,
            umask,
            cwd: std::env::current_dir()?,
            descriptors,
        })
    }
}

#[cfg(unix)]
fn describe(fd: i32) -> DescriptorInfo {
    // SAFETY: F_GETFD and isatty only query the descriptor table.
    let open = unsafe { libc::fcntl(fd, libc::F_GETFD) } != -1;
    let terminal = open && unsafe { libc::isatty(fd) } == 1;
    DescriptorInfo {
        fd,
        open,
        terminal,
        target: if open { descriptor_target(fd) } else { None },
    }
}

#[cfg(target_os = "linux")]
fn descriptor_target(fd: i32) -> Option<String> {
    std::fs::read_link(format!("/proc/self/fd/{fd}"))
        .ok()
        .map(|p| p.display().to_string())
}

#[cfg(all(unix, not(target_os = "linux")))]
fn descriptor_target(_fd: i32) -> Option<String> {
    None
}
