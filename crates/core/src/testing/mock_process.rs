//! Mock process control for testing.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::lock::{KillOutcome, ProcessControl};

#[derive(Debug, Default)]
struct State {
    outcomes: HashMap<u32, KillOutcome>,
    errors: Vec<u32>,
    kill_requests: Vec<u32>,
}

/// Mock implementation of the ProcessControl trait.
///
/// Pids without a configured outcome behave as if no such process exists.
#[derive(Debug, Clone)]
pub struct MockProcessControl {
    current_pid: u32,
    state: Arc<Mutex<State>>,
}

impl MockProcessControl {
    pub fn new(current_pid: u32) -> Self {
        Self {
            current_pid,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sets the result of killing `pid`.
    pub fn set_outcome(&self, pid: u32, outcome: KillOutcome) {
        self.state().outcomes.insert(pid, outcome);
    }

    /// Makes killing `pid` fail with an unexpected OS error.
    pub fn set_error(&self, pid: u32) {
        self.state().errors.push(pid);
    }

    /// Pids passed to `kill`, in call order.
    pub fn kill_requests(&self) -> Vec<u32> {
        self.state().kill_requests.clone()
    }
}

impl ProcessControl for MockProcessControl {
    fn current_pid(&self) -> u32 {
        self.current_pid
    }

    fn kill(&self, pid: u32) -> io::Result<KillOutcome> {
        let mut state = self.state();
        state.kill_requests.push(pid);
        if state.errors.contains(&pid) {
            return Err(io::Error::other(format!("mock signal failure for {}", pid)));
        }
        Ok(state
            .outcomes
            .get(&pid)
            .copied()
            .unwrap_or(KillOutcome::NoSuchProcess))
    }
}
