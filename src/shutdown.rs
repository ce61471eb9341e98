use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Lifecycle phase of the scheduler's background threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Workers dispatch jobs as they arrive.
    Running,
    /// Graceful shutdown: workers finish everything queued, then exit.
    Draining,
    /// Fast shutdown: workers finish only their in-flight job, then exit.
    /// Queued jobs stay queued.
    Stopping,
}

/// Shared shutdown signal for worker and aging threads.
///
/// Created in `Stopping` mode: nothing should run until the scheduler
/// transitions to `Running`. Threads observe the mode at their own cadence;
/// `sleep` additionally lets a thread wait out an interval while still
/// reacting to a mode change the moment it happens.
#[derive(Debug)]
pub struct Lifecycle {
    mode: Mutex<RunMode>,
    changed: Condvar,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            mode: Mutex::new(RunMode::Stopping),
            changed: Condvar::new(),
        }
    }

    pub fn mode(&self) -> RunMode {
        *self.mode.lock()
    }

    pub fn is_running(&self) -> bool {
        self.mode() == RunMode::Running
    }

    pub fn set(&self, mode: RunMode) {
        let mut current = self.mode.lock();
        if *current != mode {
            tracing::debug!(from = ?*current, to = ?mode, "Lifecycle transition");
            *current = mode;
            self.changed.notify_all();
        }
    }

    /// Wait until `timeout` elapses or the mode stops being `while_mode`,
    /// whichever comes first. Returns the mode in effect when the wait
    /// ended; in particular, returns straight away when the mode already
    /// differs, so a thread that lost a race with a transition does not
    /// sleep through it.
    pub fn sleep(&self, while_mode: RunMode, timeout: Duration) -> RunMode {
        let deadline = Instant::now() + timeout;
        let mut mode = self.mode.lock();
        while *mode == while_mode {
            if self.changed.wait_until(&mut mode, deadline).timed_out() {
                break;
            }
        }
        *mode
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
