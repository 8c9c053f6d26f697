//! Single-slot timer backed by a worker thread.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Default)]
struct SlotState {
    deadline: Option<Instant>,
    stopped: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<SlotState>,
    wake: Condvar,
}

/// A timer holding at most one pending deadline.
///
/// Arming replaces any pending deadline. The callback runs on the worker
/// thread without internal locks held, so it may re-arm the slot.
pub struct TimerSlot {
    name: String,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TimerSlot {
    /// Creates an idle slot. Nothing fires until [`start`](Self::start).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared::default()),
            worker: Mutex::new(None),
        }
    }

    /// Spawns the worker thread that runs `callback` at each deadline.
    pub fn start<F>(&self, callback: F) -> std::io::Result<()>
    where
        F: Fn() + Send + 'static,
    {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        let name = self.name.clone();
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run(&name, &shared, callback))?;
        *worker = Some(handle);
        Ok(())
    }

    /// Fires after `delay`, replacing any pending deadline.
    pub fn arm_after(&self, delay: Duration) {
        self.arm_at(Instant::now() + delay);
    }

    /// Fires at `when`, replacing any pending deadline.
    pub fn arm_at(&self, when: Instant) {
        let mut state = self.shared.state.lock();
        if state.stopped {
            return;
        }
        state.deadline = Some(when);
        self.shared.wake.notify_one();
    }

    /// Drops the pending deadline, if any.
    pub fn cancel(&self) {
        self.shared.state.lock().deadline = None;
        self.shared.wake.notify_one();
    }

    /// The pending deadline.
    pub fn deadline(&self) -> Option<Instant> {
        self.shared.state.lock().deadline
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// Safe to call from within the callback; the worker then exits once
    /// the callback returns.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock();
            state.stopped = true;
            state.deadline = None;
            self.shared.wake.notify_all();
        }
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for TimerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerSlot")
            .field("name", &self.name)
            .field("deadline", &self.deadline())
            .finish()
    }
}

fn run<F: Fn()>(name: &str, shared: &Shared, callback: F) {
    let mut state: MutexGuard<'_, SlotState> = shared.state.lock();
    loop {
        if state.stopped {
            break;
        }
        match state.deadline {
            None => shared.wake.wait(&mut state),
            Some(at) if Instant::now() >= at => {
                state.deadline = None;
                trace!(timer = name, "fired");
                MutexGuard::unlocked(&mut state, &callback);
            }
            Some(at) => {
                shared.wake.wait_until(&mut state, at);
            }
        }
    }
    trace!(timer = name, "stopped");
}
