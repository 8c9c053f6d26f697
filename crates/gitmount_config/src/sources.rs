//! Configuration sources and per-key priorities.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory name holding per-repository bookkeeping.
pub const CONTROL_DIR_NAME: &str = "@gitmount";
/// File name of every configuration source.
pub const CONFIG_FILE_NAME: &str = "config.json";
/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/gitmount/config.json";

/// A named configuration source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceName {
    /// `<repository root>/@gitmount/config.json`, versioned with the repository.
    Filesystem,
    /// `/etc/gitmount/config.json`.
    System,
    /// `<install dir>/config.json`, per-user install directory.
    Install,
}

impl SourceName {
    /// The source's display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceName::Filesystem => "filesystem",
            SourceName::System => "system",
            SourceName::Install => "install",
        }
    }
}

impl std::fmt::Display for SourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File locations of each source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    /// Path of the filesystem source.
    pub filesystem: PathBuf,
    /// Path of the system source.
    pub system: PathBuf,
    /// Path of the install-directory source.
    pub install: PathBuf,
}

impl ConfigPaths {
    /// Standard locations for a repository root and install directory.
    pub fn new(repo_root: &Path, install_dir: &Path) -> Self {
        Self {
            filesystem: repo_root.join(CONTROL_DIR_NAME).join(CONFIG_FILE_NAME),
            system: PathBuf::from(SYSTEM_CONFIG_PATH),
            install: install_dir.join(CONFIG_FILE_NAME),
        }
    }

    /// Overrides the system file location.
    pub fn with_system(mut self, path: impl Into<PathBuf>) -> Self {
        self.system = path.into();
        self
    }

    /// Returns the file for a source.
    pub fn path(&self, source: SourceName) -> &Path {
        match source {
            SourceName::Filesystem => &self.filesystem,
            SourceName::System => &self.system,
            SourceName::Install => &self.install,
        }
    }
}

/// Sources plus the priority order used for each key category.
///
/// Orders list the highest-priority source first. A key's category is the
/// part before its first `.`.
#[derive(Debug, Clone)]
pub struct ConfigSources {
    paths: ConfigPaths,
    default_order: Vec<SourceName>,
    orders: HashMap<String, Vec<SourceName>>,
}

impl ConfigSources {
    /// Standard priorities.
    ///
    /// Most keys prefer the repository's own file; build placement keys
    /// prefer the machine's system file.
    pub fn new(paths: ConfigPaths) -> Self {
        use SourceName::*;
        let machine_first = vec![System, Filesystem, Install];
        let mut orders = HashMap::new();
        orders.insert("build_host".to_string(), machine_first.clone());
        orders.insert("build_command".to_string(), machine_first);
        Self {
            paths,
            default_order: vec![Filesystem, System, Install],
            orders,
        }
    }

    /// Sets the order for a category.
    pub fn with_order(mut self, category: impl Into<String>, order: Vec<SourceName>) -> Self {
        self.orders.insert(category.into(), order);
        self
    }

    /// Sets the order used for categories without their own.
    pub fn with_default_order(mut self, order: Vec<SourceName>) -> Self {
        self.default_order = order;
        self
    }

    /// The ordered sources to consult for `key`.
    pub fn order_for(&self, key: &str) -> &[SourceName] {
        let category = key.split('.').next().unwrap_or(key);
        self.orders
            .get(category)
            .unwrap_or(&self.default_order)
            .as_slice()
    }

    /// Source file locations.
    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }
}
