//! # gitmount Sync Engine
//!
//! Decides when a mounted repository is committed, pulled and pushed.
//!
//! This crate provides:
//! - The sync engine (commit → pull → push, one cycle at a time)
//! - Interval selection by remote transport (local path, private or public network)
//! - A mutation debouncer with a bounded window
//! - A `git` command-line backend and a scriptable mock backend
//!
//! ## Key Invariants
//!
//! - At most one cycle runs at any instant
//! - Pull always happens before push
//! - A held gate defers the whole cycle, never part of it
//! - A diverged remote leaves `merge_needed` set until a clean pull

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod debounce;
mod engine;
mod error;
mod gate;
mod git;
mod remote;
mod timer;

pub use backend::{BackendCall, MockBackend, MockPull, PullOutcome, RepoStatus, VcsBackend};
pub use config::{DebounceConfig, SyncConfig};
pub use debounce::DirtyDebouncer;
pub use engine::{CycleOutcome, SyncEngine, SyncPhase, SyncStats, SyncStatus};
pub use error::{SyncError, SyncResult};
pub use gate::{OpenGate, SuspendListener, SyncGate, SyncTrigger};
pub use git::{parse_porcelain, GitBackend};
pub use remote::{is_private, RemoteClass, RemoteLocation};
pub use timer::TimerSlot;
