//! # gitmount Core
//!
//! A mounted git repository that commits, pulls and pushes itself.
//!
//! `MountInstance` owns every component of one mount and wires them:
//!
//! ```text
//! filesystem layer ──FsHooks──▶ DirtyDebouncer ──trigger──▶ SyncEngine ──▶ git
//!                                                              ▲
//! control socket ──▶ ControlServer ──lock/unlock──▶ LeaseLockTable (gate)
//!                          └──getConfig──▶ ConfigResolver
//! ```
//!
//! The filesystem layer itself is not part of this crate; it calls
//! [`FsHooks::notify_mutation`] after each mutation and consults
//! [`FsHooks::is_lock_held`].
//!
//! ## Example
//!
//! ```no_run
//! use gitmount_core::{MountConfig, MountInstance};
//!
//! let mount = MountInstance::start(MountConfig::new("/srv/notes", "/mnt/notes"))?;
//! let hooks = mount.hooks();
//! hooks.notify_mutation();
//! mount.shutdown()?;
//! # Ok::<(), gitmount_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir_lock;
mod error;
mod hooks;
mod instance;

pub use config::{
    control_dir, default_install_dir, socket_path, MountConfig, CONTROL_SOCKET_NAME,
    INSTALL_DIR_NAME,
};
pub use dir_lock::DirLock;
pub use error::{CoreError, CoreResult};
pub use hooks::FsHooks;
pub use instance::MountInstance;
