//! Seams between the engine and the components that drive or hold it.

/// Decides whether synchronization must wait.
pub trait SyncGate: Send + Sync {
    /// Returns true while some holder wants synchronization deferred.
    fn is_held(&self) -> bool;
}

/// A gate that never holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

impl SyncGate for OpenGate {
    fn is_held(&self) -> bool {
        false
    }
}

/// Something that can be asked to run a sync cycle now.
pub trait SyncTrigger: Send + Sync {
    /// Requests a cycle. Returns without waiting if one is already running.
    fn trigger_sync(&self);
}

/// Receives gate hold and release edges.
pub trait SuspendListener: Send + Sync {
    /// The gate started holding.
    fn on_suspend(&self);

    /// The gate stopped holding.
    fn on_resume(&self);
}
