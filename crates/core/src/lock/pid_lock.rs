//! PID-file lock implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info, warn};

use super::error::LockError;
use super::process::{KillOutcome, ProcessControl};

/// How the lock was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// No usable lock record existed.
    Free,
    /// The recorded holder no longer existed.
    StaleRecord { pid: u32 },
    /// The recorded holder was alive and has been killed.
    TookOver { pid: u32 },
}

/// Lock manager persisting the holder's PID in a local file.
pub struct PidLock {
    path: PathBuf,
    process: Arc<dyn ProcessControl>,
}

impl PidLock {
    pub fn new(path: impl Into<PathBuf>, process: Arc<dyn ProcessControl>) -> Self {
        Self {
            path: path.into(),
            process,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquires the lock, displacing a previous holder if possible.
    ///
    /// Fails with [`LockError::HolderUnkillable`] when the recorded process
    /// is alive but may not be signalled; nothing is written in that case.
    pub async fn acquire(&self) -> Result<LockGuard, LockError> {
        let current = self.process.current_pid();

        let outcome = match self.read_holder().await? {
            None => LockOutcome::Free,
            Some(pid) if pid == current => {
                debug!(pid, "Lock record already names this process");
                LockOutcome::Free
            }
            Some(pid) => {
                info!(pid, "Previous instance recorded in lock, terminating it");
                match self.process.kill(pid) {
                    Ok(KillOutcome::Terminated) => {
                        info!(pid, "Previous instance killed");
                        LockOutcome::TookOver { pid }
                    }
                    Ok(KillOutcome::NoSuchProcess) => {
                        info!(pid, "Previous instance already ended");
                        LockOutcome::StaleRecord { pid }
                    }
                    Ok(KillOutcome::PermissionDenied) => {
                        return Err(LockError::HolderUnkillable {
                            pid,
                            path: self.path.clone(),
                        });
                    }
                    Err(e) => {
                        warn!(pid, error = %e, "Unexpected error signalling previous instance, proceeding");
                        LockOutcome::StaleRecord { pid }
                    }
                }
            }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| LockError::io(parent, e))?;
        }
        fs::write(&self.path, current.to_string())
            .await
            .map_err(|e| LockError::io(&self.path, e))?;

        debug!(path = %self.path.display(), pid = current, "Lock acquired");

        Ok(LockGuard {
            path: self.path.clone(),
            outcome,
            released: false,
        })
    }

    /// Removes the lock record unconditionally. A missing record is not an error.
    pub async fn release(&self) -> Result<(), LockError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::io(&self.path, e)),
        }
    }

    /// Reads the PID from the lock record. Empty or unparsable records count as absent.
    async fn read_holder(&self) -> Result<Option<u32>, LockError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LockError::io(&self.path, e)),
        };

        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        match trimmed.parse::<u32>() {
            Ok(0) | Err(_) => {
                warn!(
                    path = %self.path.display(),
                    contents = trimmed,
                    "Ignoring unparsable lock record"
                );
                Ok(None)
            }
            Ok(pid) => Ok(Some(pid)),
        }
    }
}

/// Held lock. Dropping it removes the lock record.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    outcome: LockOutcome,
    released: bool,
}

impl LockGuard {
    pub fn outcome(&self) -> LockOutcome {
        self.outcome
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the lock now, reporting failures instead of logging them.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        remove_record(&self.path)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_record(&self.path) {
            warn!("Failed to release lock: {}", e);
        } else {
            debug!(path = %self.path.display(), "Lock released");
        }
    }
}

fn remove_record(path: &Path) -> Result<(), LockError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LockError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProcessControl;
    use tempfile::TempDir;

    const SELF_PID: u32 = 4242;

    fn lock_in(temp: &TempDir, process: &Arc<MockProcessControl>) -> PidLock {
        PidLock::new(
            temp.path().join("run/.pid"),
            Arc::clone(process) as Arc<dyn ProcessControl>,
        )
    }

    #[tokio::test]
    async fn test_acquire_free_lock_writes_pid() {
        let temp = TempDir::new().unwrap();
        let process = Arc::new(MockProcessControl::new(SELF_PID));
        let lock = lock_in(&temp, &process);

        let guard = lock.acquire().await.unwrap();
        assert_eq!(guard.outcome(), LockOutcome::Free);

        let contents = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(contents, "4242");
        assert!(process.kill_requests().is_empty());
    }

    #[tokio::test]
    async fn test_guard_drop_removes_record() {
        let temp = TempDir::new().unwrap();
        let process = Arc::new(MockProcessControl::new(SELF_PID));
        let lock = lock_in(&temp, &process);

        {
            let _guard = lock.acquire().await.unwrap();
            assert!(lock.path().exists());
        }
        assert!(!lock.path().exists());
    }

    #[tokio::test]
    async fn test_stale_record_is_taken_over() {
        let temp = TempDir::new().unwrap();
        let process = Arc::new(MockProcessControl::new(SELF_PID));
        process.set_outcome(777, KillOutcome::NoSuchProcess);
        let lock = lock_in(&temp, &process);
        std::fs::create_dir_all(lock.path().parent().unwrap()).unwrap();
        std::fs::write(lock.path(), "777\n").unwrap();

        let guard = lock.acquire().await.unwrap();
        assert_eq!(guard.outcome(), LockOutcome::StaleRecord { pid: 777 });
        assert_eq!(process.kill_requests(), vec![777]);
        assert_eq!(std::fs::read_to_string(lock.path()).unwrap(), "4242");
    }

    #[tokio::test]
    async fn test_live_holder_is_killed() {
        let temp = TempDir::new().unwrap();
        let process = Arc::new(MockProcessControl::new(SELF_PID));
        process.set_outcome(888, KillOutcome::Terminated);
        let lock = lock_in(&temp, &process);
        std::fs::create_dir_all(lock.path().parent().unwrap()).unwrap();
        std::fs::write(lock.path(), "888").unwrap();

        let guard = lock.acquire().await.unwrap();
        assert_eq!(guard.outcome(), LockOutcome::TookOver { pid: 888 });
    }

    #[tokio::test]
    async fn test_unkillable_holder_is_fatal_and_record_kept() {
        let temp = TempDir::new().unwrap();
        let process = Arc::new(MockProcessControl::new(SELF_PID));
        process.set_outcome(999, KillOutcome::PermissionDenied);
        let lock = lock_in(&temp, &process);
        std::fs::create_dir_all(lock.path().parent().unwrap()).unwrap();
        std::fs::write(lock.path(), "999").unwrap();

        let err = lock.acquire().await.unwrap_err();
        assert!(matches!(err, LockError::HolderUnkillable { pid: 999, .. }));
        assert_eq!(std::fs::read_to_string(lock.path()).unwrap(), "999");
    }

    #[tokio::test]
    async fn test_garbage_record_is_ignored() {
        let temp = TempDir::new().unwrap();
        let process = Arc::new(MockProcessControl::new(SELF_PID));
        let lock = lock_in(&temp, &process);
        std::fs::create_dir_all(lock.path().parent().unwrap()).unwrap();
        std::fs::write(lock.path(), "not-a-pid").unwrap();

        let guard = lock.acquire().await.unwrap();
        assert_eq!(guard.outcome(), LockOutcome::Free);
        assert!(process.kill_requests().is_empty());
    }

    #[tokio::test]
    async fn test_signal_error_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let process = Arc::new(MockProcessControl::new(SELF_PID));
        process.set_error(555);
        let lock = lock_in(&temp, &process);
        std::fs::create_dir_all(lock.path().parent().unwrap()).unwrap();
        std::fs::write(lock.path(), "555").unwrap();

        let guard = lock.acquire().await.unwrap();
        assert_eq!(guard.outcome(), LockOutcome::StaleRecord { pid: 555 });
        assert_eq!(std::fs::read_to_string(lock.path()).unwrap(), "4242");
    }

    #[tokio::test]
    async fn test_own_pid_is_not_killed() {
        let temp = TempDir::new().unwrap();
        let process = Arc::new(MockProcessControl::new(SELF_PID));
        let lock = lock_in(&temp, &process);
        std::fs::create_dir_all(lock.path().parent().unwrap()).unwrap();
        std::fs::write(lock.path(), "4242").unwrap();

        let guard = lock.acquire().await.unwrap();
        assert_eq!(guard.outcome(), LockOutcome::Free);
        assert!(process.kill_requests().is_empty());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let process = Arc::new(MockProcessControl::new(SELF_PID));
        let lock = lock_in(&temp, &process);

        let guard = lock.acquire().await.unwrap();
        guard.release().unwrap();
        assert!(!lock.path().exists());
        lock.release().await.unwrap();
    }
}
