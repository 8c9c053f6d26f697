//! # gitmount Config
//!
//! Per-machine configuration resolution for gitmount.
//!
//! A key is looked up in a priority-ordered list of sources (the repository's
//! own `@gitmount/config.json`, `/etc/gitmount/config.json`, and the install
//! directory). Values may be:
//!
//! - a scalar, used as-is
//! - a list, from which one element is chosen at random
//! - a table of host patterns, from which the entry with the best
//!   [`Affinity`] for this host is chosen
//!
//! ```
//! use gitmount_config::{Affinity, HostIdentity};
//!
//! let host = HostIdentity::new("build3.lab.example.com", vec!["10.1.2.3".parse().unwrap()]);
//! assert_eq!(host.score("10.0.0.0/8"), Some(Affinity::Address { bits: 8 }));
//! assert_eq!(host.score("default"), Some(Affinity::Default));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod affinity;
mod error;
mod loader;
mod resolver;
mod sources;
mod value;

pub use affinity::{best_match, Affinity, HostIdentity, DEFAULT_PATTERN};
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, JsonFileLoader, MemoryLoader};
pub use resolver::{ConfigResolver, Resolution};
pub use sources::{
    ConfigPaths, ConfigSources, SourceName, CONFIG_FILE_NAME, CONTROL_DIR_NAME,
    SYSTEM_CONFIG_PATH,
};
pub use value::ConfigValue;
