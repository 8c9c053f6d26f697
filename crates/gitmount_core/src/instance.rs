//! A running mount: every component of one repository, wired together.

use crate::config::MountConfig;
use crate::dir_lock::DirLock;
use crate::error::{CoreError, CoreResult};
use crate::hooks::FsHooks;
use gitmount_config::{ConfigResolver, ConfigSources, HostIdentity};
use gitmount_control::{probe, ControlServer, InstanceInfo, LeaseLockTable, RequestHandler};
use gitmount_protocol::InfoResponse;
use gitmount_sync_engine::{
    CycleOutcome, DirtyDebouncer, GitBackend, SuspendListener, SyncEngine, SyncGate, SyncStatus,
    SyncTrigger, VcsBackend,
};
use std::fs;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{info, warn};

struct MountInfo<B: VcsBackend> {
    origin: String,
    branch: String,
    root: String,
    path: String,
    engine: Weak<SyncEngine<B>>,
}

impl<B: VcsBackend> InstanceInfo for MountInfo<B> {
    fn info(&self) -> InfoResponse {
        InfoResponse {
            origin: self.origin.clone(),
            branch: self.branch.clone(),
            root: self.root.clone(),
            path: self.path.clone(),
            merge_needed: self
                .engine
                .upgrade()
                .is_some_and(|engine| engine.merge_needed()),
            held: false,
        }
    }
}

/// One mounted repository.
///
/// [`start`](Self::start) takes the setup lock, refuses if another instance
/// answers on the control socket, then starts the lease table, the sync
/// engine, the debouncer and the control server, and schedules a forced
/// first sync. [`shutdown`](Self::shutdown) runs a final sync and removes
/// the socket.
pub struct MountInstance<B: VcsBackend = GitBackend> {
    config: MountConfig,
    engine: Arc<SyncEngine<B>>,
    debouncer: Arc<DirtyDebouncer>,
    leases: Arc<LeaseLockTable>,
    resolver: Arc<ConfigResolver>,
    server: ControlServer,
    stopped: AtomicBool,
}

impl MountInstance<GitBackend> {
    /// Mounts `config.root`, driving the `git` command line.
    pub fn start(config: MountConfig) -> CoreResult<Self> {
        let backend = GitBackend::new(&config.root);
        Self::start_with_backend(config, backend)
    }
}

impl<B: VcsBackend + 'static> MountInstance<B> {
    /// Mounts `config.root` with an explicit backend.
    pub fn start_with_backend(config: MountConfig, backend: B) -> CoreResult<Self> {
        if !config.root.is_dir() {
            return Err(CoreError::InvalidRoot {
                path: config.root.clone(),
            });
        }
        let control_dir = config.control_dir();
        fs::create_dir_all(&control_dir)?;
        let setup = DirLock::acquire(&control_dir, config.setup_timeout)?;

        let socket = config.socket_path();
        if probe(&socket) {
            return Err(CoreError::AlreadyMounted { socket });
        }
        match fs::remove_file(&socket) {
            Ok(()) => info!(path = %socket.display(), "removed stale control socket"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let leases = LeaseLockTable::new(config.lease)?;
        let gate: Arc<dyn SyncGate> = leases.clone();
        let engine = SyncEngine::new(config.sync_config(), backend, gate)?;
        let listener: Weak<dyn SuspendListener> = Arc::downgrade(&engine) as Weak<dyn SuspendListener>;
        leases.set_listener(listener);

        let sink: Arc<dyn SyncTrigger> = engine.clone();
        let debouncer = DirtyDebouncer::new(config.debounce, sink)?;

        let resolver = Arc::new(ConfigResolver::new(
            ConfigSources::new(config.config_paths()),
            HostIdentity::detect(),
        ));
        let mount_info = MountInfo {
            origin: config.origin.clone(),
            branch: config.branch.clone(),
            root: config.root.display().to_string(),
            path: config.mount_point.display().to_string(),
            engine: Arc::downgrade(&engine),
        };
        let handler = RequestHandler::new(leases.clone(), resolver.clone(), Arc::new(mount_info));
        let server = ControlServer::bind(config.server_config(), handler)?;
        setup.release()?;

        info!(
            root = %config.root.display(),
            mount_point = %config.mount_point.display(),
            origin = %config.origin,
            branch = %config.branch,
            "mount started"
        );
        engine.force_push();
        engine.request_sync();

        Ok(Self {
            config,
            engine,
            debouncer,
            leases,
            resolver,
            server,
            stopped: AtomicBool::new(false),
        })
    }
}

impl<B: VcsBackend> MountInstance<B> {
    /// The configuration.
    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    /// Hooks for the filesystem layer.
    pub fn hooks(&self) -> FsHooks {
        FsHooks::new(self.debouncer.clone(), self.leases.clone())
    }

    /// The sync engine.
    pub fn engine(&self) -> &Arc<SyncEngine<B>> {
        &self.engine
    }

    /// The lease table.
    pub fn leases(&self) -> &Arc<LeaseLockTable> {
        &self.leases
    }

    /// The configuration resolver.
    pub fn resolver(&self) -> &Arc<ConfigResolver> {
        &self.resolver
    }

    /// The control server.
    pub fn server(&self) -> &ControlServer {
        &self.server
    }

    /// Snapshot of the sync engine.
    pub fn status(&self) -> SyncStatus {
        self.engine.status()
    }

    /// Stops debouncing, runs the final sync, then closes the control socket.
    ///
    /// Returns the final cycle's outcome, or `None` if already stopped.
    pub fn shutdown(&self) -> CoreResult<Option<CycleOutcome>> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        info!(root = %self.config.root.display(), "mount shutting down");
        self.debouncer.stop();
        let outcome = self.engine.shutdown();
        self.server.shutdown();
        self.leases.stop();
        let outcome = outcome?;
        if outcome != CycleOutcome::Synced {
            warn!(?outcome, "final sync did not push");
        }
        Ok(Some(outcome))
    }
}

impl<B: VcsBackend> Drop for MountInstance<B> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "shutdown on drop failed");
        }
    }
}

impl<B: VcsBackend> std::fmt::Debug for MountInstance<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountInstance")
            .field("root", &self.config.root)
            .field("mount_point", &self.config.mount_point)
            .field("engine", &self.engine)
            .finish()
    }
}
