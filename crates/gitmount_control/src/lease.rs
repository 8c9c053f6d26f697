//! Lease table that suspends synchronization while held.

use crate::config::LeaseConfig;
use crate::error::ControlResult;
use gitmount_sync_engine::{SuspendListener, SyncGate, TimerSlot};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Suspend,
    Resume,
}

#[derive(Debug, Default)]
struct Leases {
    expiry: HashMap<String, Instant>,
    suspended: bool,
}

impl Leases {
    /// Collects abandoned leases and computes the edge and next wakeup.
    fn settle(&mut self, now: Instant, grace: Duration) -> (Option<Edge>, Option<Instant>) {
        self.expiry.retain(|name, at| {
            let keep = now.saturating_duration_since(*at) < grace;
            if !keep {
                debug!(%name, "collected abandoned lease");
            }
            keep
        });

        let live = self.expiry.values().filter(|at| **at > now).min().copied();
        let edge = match (live.is_some(), self.suspended) {
            (true, false) => Some(Edge::Suspend),
            (false, true) => Some(Edge::Resume),
            _ => None,
        };
        self.suspended = live.is_some();

        let wakeup = live.or_else(|| self.expiry.values().map(|at| *at + grace).min());
        (edge, wakeup)
    }
}

/// Named, time-bounded leases.
///
/// While any lease has not reached its expiry the table holds
/// synchronization. Expired leases linger for the grace window before they
/// are collected. The suspend edge fires when the first live lease appears,
/// the resume edge when the last one expires or is released.
pub struct LeaseLockTable {
    config: LeaseConfig,
    leases: Mutex<Leases>,
    edges: Mutex<()>,
    listener: RwLock<Option<Weak<dyn SuspendListener>>>,
    timer: TimerSlot,
}

impl LeaseLockTable {
    /// Creates an empty table and starts its expiry timer.
    pub fn new(config: LeaseConfig) -> ControlResult<Arc<Self>> {
        let table = Arc::new(Self {
            config,
            leases: Mutex::new(Leases::default()),
            edges: Mutex::new(()),
            listener: RwLock::new(None),
            timer: TimerSlot::new("gitmount-lease"),
        });
        let weak: Weak<Self> = Arc::downgrade(&table);
        table.timer.start(move || {
            if let Some(table) = weak.upgrade() {
                table.sweep();
            }
        })?;
        Ok(table)
    }

    /// Registers the receiver of suspend and resume edges.
    pub fn set_listener(&self, listener: Weak<dyn SuspendListener>) {
        *self.listener.write() = Some(listener);
    }

    /// The configuration.
    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    /// Takes or renews `name` for the configured ttl.
    pub fn acquire(&self, name: &str) {
        self.acquire_at(name, self.config.ttl, Instant::now());
    }

    /// Takes or renews `name` until `now + ttl`.
    ///
    /// Renewal never shortens an existing lease.
    pub fn acquire_at(&self, name: &str, ttl: Duration, now: Instant) {
        let until = now + ttl;
        self.mutate(now, |leases| {
            let at = leases.expiry.entry(name.to_string()).or_insert(until);
            *at = (*at).max(until);
            debug!(%name, ?ttl, "lease acquired");
        });
    }

    /// Drops `name`. Returns false if it was not present.
    pub fn release(&self, name: &str) -> bool {
        self.release_at(name, Instant::now())
    }

    /// Drops `name`, settling the table as of `now`.
    pub fn release_at(&self, name: &str, now: Instant) -> bool {
        let mut removed = false;
        self.mutate(now, |leases| {
            removed = leases.expiry.remove(name).is_some();
        });
        debug!(%name, removed, "lease released");
        removed
    }

    /// Collects abandoned leases and re-evaluates the hold.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    /// Collects and re-evaluates as of `now`.
    pub fn sweep_at(&self, now: Instant) {
        self.mutate(now, |_| {});
    }

    /// Returns true if some lease is live at `now`.
    pub fn is_held_at(&self, now: Instant) -> bool {
        self.leases.lock().expiry.values().any(|at| *at > now)
    }

    /// Expiry of `name`, if present.
    pub fn expiry(&self, name: &str) -> Option<Instant> {
        self.leases.lock().expiry.get(name).copied()
    }

    /// Number of leases, including expired ones not yet collected.
    pub fn len(&self) -> usize {
        self.leases.lock().expiry.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// When the expiry timer next fires.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Stops the expiry timer.
    pub fn stop(&self) {
        self.timer.stop();
    }

    /// Applies `f`, re-arms the timer and emits any edge after unlocking.
    fn mutate(&self, now: Instant, f: impl FnOnce(&mut Leases)) {
        let _edges = self.edges.lock();
        let (edge, wakeup) = {
            let mut leases = self.leases.lock();
            f(&mut leases);
            leases.settle(now, self.config.grace)
        };

        match wakeup {
            Some(at) => self.timer.arm_at(at),
            None => self.timer.cancel(),
        }

        let Some(edge) = edge else {
            return;
        };
        let listener = self.listener.read().as_ref().and_then(Weak::upgrade);
        match edge {
            Edge::Suspend => {
                info!("synchronization suspended by lease");
                if let Some(l) = listener {
                    l.on_suspend();
                }
            }
            Edge::Resume => {
                info!("synchronization resumed");
                if let Some(l) = listener {
                    l.on_resume();
                }
            }
        }
    }
}

impl SyncGate for LeaseLockTable {
    fn is_held(&self) -> bool {
        self.is_held_at(Instant::now())
    }
}

impl std::fmt::Debug for LeaseLockTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseLockTable")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}
