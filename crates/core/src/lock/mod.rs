//! Single-instance lock for the commit pipeline.
//!
//! The lock record is a local file holding the PID of the running instance.
//! A new run forcibly terminates a recorded holder that is still alive and
//! refuses to start when the holder cannot be signalled. The record is
//! removed when the [`LockGuard`] returned by [`PidLock::acquire`] is dropped,
//! so every exit path, including errors and cancellation, frees the lock.
//!
//! PID locking only works on a single host.

mod error;
mod pid_lock;
mod process;

pub use error::LockError;
pub use pid_lock::{LockGuard, LockOutcome, PidLock};
pub use process::{KillOutcome, ProcessControl, SignalProcessControl};
