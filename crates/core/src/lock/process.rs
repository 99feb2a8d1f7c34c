//! Process control used to displace a previous pipeline instance.

use std::io;

/// Result of sending a forced termination signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// The signal was delivered.
    Terminated,
    /// No process with that id exists.
    NoSuchProcess,
    /// The process exists but we may not signal it.
    PermissionDenied,
}

/// Sends signals to other processes by id.
pub trait ProcessControl: Send + Sync {
    /// Id of the calling process.
    fn current_pid(&self) -> u32;

    /// Forcibly terminates `pid`.
    ///
    /// Outcomes the caller must distinguish are returned as [`KillOutcome`];
    /// anything else is an error.
    fn kill(&self, pid: u32) -> io::Result<KillOutcome>;
}

/// [`ProcessControl`] backed by `kill(2)` with `SIGKILL`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalProcessControl;

impl SignalProcessControl {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessControl for SignalProcessControl {
    fn current_pid(&self) -> u32 {
        std::process::id()
    }

    #[cfg(unix)]
    fn kill(&self, pid: u32) -> io::Result<KillOutcome> {
        // 0 and negative ids address process groups
        let pid = libc::pid_t::try_from(pid)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, format!("invalid pid {}", pid))
            })?;

        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid, libc::SIGKILL) };
        if rc == 0 {
            return Ok(KillOutcome::Terminated);
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ESRCH) => Ok(KillOutcome::NoSuchProcess),
            Some(libc::EPERM) => Ok(KillOutcome::PermissionDenied),
            _ => Err(err),
        }
    }

    #[cfg(not(unix))]
    fn kill(&self, _pid: u32) -> io::Result<KillOutcome> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "process signalling is only supported on unix",
        ))
    }
}
