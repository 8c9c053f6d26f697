//! Coalesces bursts of filesystem mutations into sync triggers.

use crate::config::DebounceConfig;
use crate::error::SyncResult;
use crate::gate::SyncTrigger;
use crate::timer::TimerSlot;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::trace;

#[derive(Debug, Default)]
struct Burst {
    first_dirty: Option<Instant>,
    fire_at: Option<Instant>,
}

/// Turns mutation notifications into at most one trigger per burst.
///
/// Each notification postpones the trigger to `delay` after it, but never
/// past `max_window` after the burst's first notification.
pub struct DirtyDebouncer {
    config: DebounceConfig,
    sink: Arc<dyn SyncTrigger>,
    burst: Mutex<Burst>,
    timer: TimerSlot,
}

impl DirtyDebouncer {
    /// Creates a debouncer that triggers `sink`.
    pub fn new(config: DebounceConfig, sink: Arc<dyn SyncTrigger>) -> SyncResult<Arc<Self>> {
        let debouncer = Arc::new(Self {
            config,
            sink,
            burst: Mutex::new(Burst::default()),
            timer: TimerSlot::new("gitmount-debounce"),
        });
        let weak: Weak<Self> = Arc::downgrade(&debouncer);
        debouncer.timer.start(move || {
            if let Some(d) = weak.upgrade() {
                d.fire();
            }
        })?;
        Ok(debouncer)
    }

    /// Records a mutation.
    pub fn notify(&self) {
        let now = Instant::now();
        let mut burst = self.burst.lock();
        let first = *burst.first_dirty.get_or_insert(now);
        let window_end = first + self.config.max_window;
        if now.saturating_duration_since(first) >= self.config.max_window {
            // Window exhausted; the pending trigger stands.
            return;
        }
        let at = (now + self.config.delay).min(window_end);
        burst.fire_at = Some(at);
        self.timer.arm_at(at);
        trace!(?at, "debounce armed");
    }

    /// Cancels any pending trigger and triggers now, on the caller's thread.
    pub fn flush(&self) {
        self.timer.cancel();
        *self.burst.lock() = Burst::default();
        self.sink.trigger_sync();
    }

    /// When the pending trigger will fire.
    pub fn pending(&self) -> Option<Instant> {
        self.burst.lock().fire_at
    }

    /// Stops the timer thread. Pending triggers are dropped.
    pub fn stop(&self) {
        self.timer.stop();
        *self.burst.lock() = Burst::default();
    }

    fn fire(&self) {
        {
            let mut burst = self.burst.lock();
            match burst.fire_at {
                // Re-armed after the timer popped.
                Some(at) if at > Instant::now() => return,
                None => return,
                Some(_) => *burst = Burst::default(),
            }
        }
        trace!("debounce fired");
        self.sink.trigger_sync();
    }
}

impl std::fmt::Debug for DirtyDebouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirtyDebouncer")
            .field("config", &self.config)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl SyncTrigger for Counter {
        fn trigger_sync(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn debouncer(delay_ms: u64, window_ms: u64) -> (Arc<DirtyDebouncer>, Arc<Counter>) {
        let counter = Arc::new(Counter::default());
        let config = DebounceConfig::new(
            Duration::from_millis(delay_ms),
            Duration::from_millis(window_ms),
        );
        (DirtyDebouncer::new(config, counter.clone()).unwrap(), counter)
    }

    #[test]
    fn single_notify_fires_after_delay() {
        let (d, count) = debouncer(20, 1000);
        d.notify();
        assert!(d.pending().is_some());
        thread::sleep(Duration::from_millis(150));
        assert_eq!(count.0.load(Ordering::SeqCst), 1);
        assert!(d.pending().is_none());
    }

    #[test]
    fn notify_postpones_within_window() {
        let (d, count) = debouncer(60, 10_000);
        let start = Instant::now();
        d.notify();
        thread::sleep(Duration::from_millis(30));
        d.notify();
        let pending = d.pending().unwrap();
        assert!(pending >= start + Duration::from_millis(80));
        thread::sleep(Duration::from_millis(200));
        assert_eq!(count.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pending_never_exceeds_window() {
        let (d, _count) = debouncer(500, 100);
        let start = Instant::now();
        d.notify();
        let pending = d.pending().unwrap();
        assert!(pending <= start + Duration::from_millis(110));
    }

    #[test]
    fn flush_triggers_synchronously_and_cancels() {
        let (d, count) = debouncer(50, 1000);
        d.notify();
        d.flush();
        assert_eq!(count.0.load(Ordering::SeqCst), 1);
        assert!(d.pending().is_none());
        thread::sleep(Duration::from_millis(120));
        assert_eq!(count.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stopped_debouncer_never_fires() {
        let (d, count) = debouncer(10, 1000);
        d.notify();
        d.stop();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(count.0.load(Ordering::SeqCst), 0);
    }
}
