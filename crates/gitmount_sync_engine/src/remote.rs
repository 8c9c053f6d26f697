//! Remote location parsing and transport classification.

use std::net::{IpAddr, ToSocketAddrs};
use std::path::PathBuf;
use tracing::debug;

/// Where a remote lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteLocation {
    /// A path on this machine.
    Local(PathBuf),
    /// A network host.
    Network {
        /// Host name or address literal.
        host: String,
        /// Explicit port, if any.
        port: Option<u16>,
    },
}

/// Transport class that decides how often to sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteClass {
    /// Local-path remote.
    Local,
    /// Network remote on a private address range.
    Private,
    /// Network remote elsewhere.
    Public,
    /// Network remote whose host did not resolve.
    Unresolved,
}

impl RemoteLocation {
    /// Parses a remote URL.
    ///
    /// Accepts `scheme://[user@]host[:port]/path`, `file://path`,
    /// scp-style `[user@]host:path`, and plain paths.
    pub fn parse(url: &str) -> Self {
        let url = url.trim();
        if let Some(path) = url.strip_prefix("file://") {
            return RemoteLocation::Local(PathBuf::from(path));
        }
        if let Some((_, rest)) = url.split_once("://") {
            let authority = rest.split('/').next().unwrap_or_default();
            return Self::from_authority(authority);
        }
        if let Some((before, _)) = url.split_once(':') {
            if !before.contains('/') && !before.is_empty() {
                return Self::from_authority(before);
            }
        }
        RemoteLocation::Local(PathBuf::from(url))
    }

    fn from_authority(authority: &str) -> Self {
        let host_port = authority.rsplit('@').next().unwrap_or(authority);
        let (host, port) = if let Some(rest) = host_port.strip_prefix('[') {
            // [v6]:port
            match rest.split_once(']') {
                Some((host, tail)) => (host, tail.strip_prefix(':').and_then(|p| p.parse().ok())),
                None => (rest, None),
            }
        } else {
            match host_port.rsplit_once(':') {
                Some((host, port)) if !host.contains(':') => (host, port.parse().ok()),
                _ => (host_port, None),
            }
        };
        RemoteLocation::Network {
            host: host.to_string(),
            port,
        }
    }

    /// Classifies the remote, resolving network hosts through DNS.
    pub fn classify(&self) -> RemoteClass {
        match self {
            RemoteLocation::Local(_) => RemoteClass::Local,
            RemoteLocation::Network { host, port } => {
                match (host.as_str(), port.unwrap_or(0)).to_socket_addrs() {
                    Ok(addrs) => {
                        let addrs: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
                        if addrs.is_empty() {
                            RemoteClass::Unresolved
                        } else if addrs.iter().any(is_private) {
                            RemoteClass::Private
                        } else {
                            RemoteClass::Public
                        }
                    }
                    Err(e) => {
                        debug!(%host, error = %e, "remote host did not resolve");
                        RemoteClass::Unresolved
                    }
                }
            }
        }
    }
}

/// True for loopback, link-local and private-range addresses.
pub fn is_private(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private(&IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            v6.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}
