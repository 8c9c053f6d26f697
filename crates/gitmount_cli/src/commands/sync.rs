//! One-shot sync command.
//!
//! When an instance is running, its lease is held for the duration so the
//! instance's own engine stays out of the way.

use gitmount_control::ControlClient;
use gitmount_core::socket_path;
use gitmount_sync_engine::{GitBackend, OpenGate, SyncConfig, SyncEngine};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const RENEW_EVERY: Duration = Duration::from_secs(20);

/// Runs a single commit/pull/push cycle in `root`.
pub fn run(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (hold, config) = match ControlClient::connect(&socket_path(root)) {
        Ok(mut client) => {
            let info = client.info()?;
            let config = SyncConfig::new(info.origin, info.branch);
            (Some(client.hold_lock(RENEW_EVERY)?), config)
        }
        Err(e) if e.is_unreachable() => {
            tracing::debug!(error = %e, "no running instance, syncing unlocked");
            (None, SyncConfig::default())
        }
        Err(e) => return Err(e.into()),
    };

    let engine = SyncEngine::new(config, GitBackend::new(root), Arc::new(OpenGate))?;
    // Halting runs one forced cycle and leaves no scheduler behind.
    let outcome = engine.shutdown()?;
    let merge_needed = engine.merge_needed();
    let last_error = engine.stats().last_error;

    if let Some(hold) = hold {
        hold.release()?;
    }

    println!("Sync: {:?}", outcome);
    if merge_needed {
        println!("Merge needed: pull could not fast-forward");
    }
    if let Some(error) = last_error {
        println!("Last error: {}", error);
    }
    Ok(())
}
