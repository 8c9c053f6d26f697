//! Mount configuration.

use gitmount_config::{ConfigPaths, CONTROL_DIR_NAME};
use gitmount_control::{LeaseConfig, ServerConfig};
use gitmount_sync_engine::{DebounceConfig, SyncConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the control socket inside the control directory.
pub const CONTROL_SOCKET_NAME: &str = "control";

/// Per-user install directory name under the home directory.
pub const INSTALL_DIR_NAME: &str = ".gitmount";

/// Configuration for one mounted repository.
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// Remote to synchronize with.
    pub origin: String,
    /// Branch to synchronize.
    pub branch: String,
    /// Repository working tree.
    pub root: PathBuf,
    /// Where the filesystem layer exposes the repository.
    pub mount_point: PathBuf,
    /// Per-user install directory holding the install config source.
    pub install_dir: PathBuf,
    /// Override for the system config file.
    pub system_config: Option<PathBuf>,
    /// Sync scheduling.
    pub sync: SyncConfig,
    /// Mutation debouncing.
    pub debounce: DebounceConfig,
    /// Lease lifetimes.
    pub lease: LeaseConfig,
    /// Maximum concurrent control connections.
    pub max_connections: usize,
    /// Control connection idle timeout.
    pub recv_timeout: Duration,
    /// How long to wait for the setup lock.
    pub setup_timeout: Duration,
}

impl MountConfig {
    /// Creates a configuration for `root` mounted at `mount_point`.
    pub fn new(root: impl Into<PathBuf>, mount_point: impl Into<PathBuf>) -> Self {
        let server = ServerConfig::new(PathBuf::new());
        Self {
            origin: "origin".into(),
            branch: "master".into(),
            root: root.into(),
            mount_point: mount_point.into(),
            install_dir: default_install_dir(),
            system_config: None,
            sync: SyncConfig::default(),
            debounce: DebounceConfig::default(),
            lease: LeaseConfig::default(),
            max_connections: server.max_connections,
            recv_timeout: server.recv_timeout,
            setup_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the remote and branch.
    pub fn with_remote(mut self, origin: impl Into<String>, branch: impl Into<String>) -> Self {
        self.origin = origin.into();
        self.branch = branch.into();
        self
    }

    /// Sets the install directory.
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = dir.into();
        self
    }

    /// Overrides the system config file location.
    pub fn with_system_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.system_config = Some(path.into());
        self
    }

    /// Sets sync scheduling. Remote and branch come from this config.
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    /// Sets mutation debouncing.
    pub fn with_debounce(mut self, debounce: DebounceConfig) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets lease lifetimes.
    pub fn with_lease(mut self, lease: LeaseConfig) -> Self {
        self.lease = lease;
        self
    }

    /// Sets the setup lock timeout.
    pub fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    /// `<root>/@gitmount`.
    pub fn control_dir(&self) -> PathBuf {
        control_dir(&self.root)
    }

    /// `<root>/@gitmount/control`.
    pub fn socket_path(&self) -> PathBuf {
        socket_path(&self.root)
    }

    /// Sync configuration carrying this mount's remote and branch.
    pub fn sync_config(&self) -> SyncConfig {
        let mut sync = self.sync.clone();
        sync.remote = self.origin.clone();
        sync.branch = self.branch.clone();
        sync
    }

    /// Control server configuration.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.socket_path())
            .with_max_connections(self.max_connections)
            .with_recv_timeout(self.recv_timeout)
    }

    /// Config source locations.
    pub fn config_paths(&self) -> ConfigPaths {
        let paths = ConfigPaths::new(&self.root, &self.install_dir);
        match &self.system_config {
            Some(system) => paths.with_system(system.clone()),
            None => paths,
        }
    }
}

/// Control directory of a repository root.
pub fn control_dir(root: &Path) -> PathBuf {
    root.join(CONTROL_DIR_NAME)
}

/// Control socket of a repository root.
pub fn socket_path(root: &Path) -> PathBuf {
    control_dir(root).join(CONTROL_SOCKET_NAME)
}

/// `~/.gitmount`, or a relative `.gitmount` without a home directory.
pub fn default_install_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(INSTALL_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(INSTALL_DIR_NAME))
}
