//! Host-affinity configuration resolution.

use crate::affinity::{best_match, Affinity, HostIdentity};
use crate::error::ConfigResult;
use crate::loader::{ConfigLoader, JsonFileLoader};
use crate::sources::{ConfigSources, SourceName};
use crate::value::ConfigValue;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// The winning value for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The resolved scalar.
    pub value: String,
    /// How well it matched this host.
    pub affinity: Affinity,
    /// Source it came from.
    pub source: SourceName,
}

/// Resolves configuration keys against prioritized sources.
///
/// Sources are consulted in the key's priority order. A source without the
/// key is skipped. A source whose only match is the `default` pattern is kept
/// as a fallback while later sources are consulted; the first non-default
/// match ends the search. Loaded sources are cached until [`flush`].
///
/// [`flush`]: ConfigResolver::flush
pub struct ConfigResolver<L: ConfigLoader = JsonFileLoader> {
    sources: ConfigSources,
    loader: L,
    host: HostIdentity,
    cache: RwLock<HashMap<SourceName, Option<Arc<ConfigValue>>>>,
}

impl ConfigResolver<JsonFileLoader> {
    /// Creates a resolver reading JSON files.
    pub fn new(sources: ConfigSources, host: HostIdentity) -> Self {
        Self::with_loader(sources, host, JsonFileLoader)
    }
}

impl<L: ConfigLoader> ConfigResolver<L> {
    /// Creates a resolver with a custom loader.
    pub fn with_loader(sources: ConfigSources, host: HostIdentity, loader: L) -> Self {
        Self {
            sources,
            loader,
            host,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The host identity used for scoring.
    pub fn host(&self) -> &HostIdentity {
        &self.host
    }

    /// Resolves `key` to its best value, if any source matches.
    pub fn resolve(&self, key: &str) -> ConfigResult<Option<Resolution>> {
        let mut best: Option<Resolution> = None;

        for &source in self.sources.order_for(key) {
            let Some(tree) = self.source(source)? else {
                continue;
            };
            let Some(node) = tree.get(key) else {
                continue;
            };
            let Some((value, affinity)) = self.pick(node, Affinity::Unconditional) else {
                debug!(%key, %source, "no pattern matched this host");
                continue;
            };

            let replace = match &best {
                None => true,
                Some(current) => !affinity.is_fallback() && affinity >= current.affinity,
            };
            if replace {
                best = Some(Resolution {
                    value,
                    affinity,
                    source,
                });
            }
            if best.as_ref().is_some_and(|b| !b.affinity.is_fallback()) {
                break;
            }
        }

        if let Some(r) = &best {
            debug!(%key, source = %r.source, affinity = ?r.affinity, "resolved config");
        }
        Ok(best)
    }

    /// Resolves `key` to its value text.
    pub fn get(&self, key: &str) -> ConfigResult<Option<String>> {
        Ok(self.resolve(key)?.map(|r| r.value))
    }

    /// Drops every cached source so the next lookup reloads from disk.
    pub fn flush(&self) {
        self.cache.write().clear();
    }

    fn source(&self, name: SourceName) -> ConfigResult<Option<Arc<ConfigValue>>> {
        if let Some(cached) = self.cache.read().get(&name) {
            return Ok(cached.clone());
        }
        let path = self.sources.paths().path(name);
        let loaded = self.loader.load(path)?.map(Arc::new);
        if loaded.is_none() {
            debug!(source = %name, path = %path.display(), "config source absent");
        }
        self.cache.write().insert(name, loaded.clone());
        Ok(loaded)
    }

    /// Reduces a node to one scalar.
    ///
    /// Maps are host-pattern tables; lists pick one element at random.
    fn pick(&self, node: &ConfigValue, affinity: Affinity) -> Option<(String, Affinity)> {
        match node {
            ConfigValue::Scalar(s) => Some((s.clone(), affinity)),
            ConfigValue::List(items) => {
                let chosen = items.choose(&mut rand::thread_rng())?;
                self.pick(chosen, affinity)
            }
            ConfigValue::Map(entries) => {
                let scored = entries
                    .iter()
                    .filter_map(|(pattern, v)| self.host.score(pattern).map(|s| (s, v)));
                let (score, value) = best_match(scored)?;
                self.pick(value, score)
            }
        }
    }
}
