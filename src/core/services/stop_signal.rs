use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Shared {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Cloneable cancellation flag with an interruptible wait.
///
/// The capture loop sleeps on it between cycles; any clone can end the
/// sleep early by calling `request_stop`.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every waiter to stop. Idempotent.
    pub fn request_stop(&self) {
        let mut stopped = self
            .shared
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *stopped = true;
        self.shared.wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self
            .shared
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for up to `timeout`. Returns `true` if a stop was requested
    /// before or during the wait.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        // No representable deadline: wait until stopped.
        let deadline = Instant::now().checked_add(timeout);
        let mut stopped = self
            .shared
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Condvar waits can wake spuriously; loop until the deadline.
        while !*stopped {
            stopped = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.shared
                        .wake
                        .wait_timeout(stopped, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .shared
                    .wake
                    .wait(stopped)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
        true
    }
}
