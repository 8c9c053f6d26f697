//! Configuration file loaders.

use crate::error::{ConfigError, ConfigResult};
use crate::value::ConfigValue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Loads one configuration file into a tree.
///
/// A missing or unreadable file is `Ok(None)` (the source is absent). A file
/// that exists but is malformed is an error.
pub trait ConfigLoader: Send + Sync {
    /// Loads the file at `path`.
    fn load(&self, path: &Path) -> ConfigResult<Option<ConfigValue>>;
}

/// Loads JSON documents whose top level is an object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFileLoader;

impl ConfigLoader for JsonFileLoader {
    fn load(&self, path: &Path) -> ConfigResult<Option<ConfigValue>> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                return Ok(None);
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    file: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| ConfigError::parse(e.to_string(), path, e.line()))?;
        if !json.is_object() {
            return Err(ConfigError::parse("top level must be an object", path, 1));
        }
        Ok(ConfigValue::from_json(json))
    }
}

/// An in-memory loader keyed by path.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    files: RwLock<HashMap<PathBuf, ConfigValue>>,
}

impl MemoryLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs (or replaces) the tree returned for `path`.
    pub fn insert(&self, path: impl Into<PathBuf>, value: ConfigValue) {
        self.files.write().insert(path.into(), value);
    }

    /// Removes the tree for `path`.
    pub fn remove(&self, path: &Path) {
        self.files.write().remove(path);
    }
}

impl ConfigLoader for MemoryLoader {
    fn load(&self, path: &Path) -> ConfigResult<Option<ConfigValue>> {
        Ok(self.files.read().get(path).cloned())
    }
}
