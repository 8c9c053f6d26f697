//! Control server and lease configuration.

use gitmount_protocol::DEFAULT_PREFIX_WIDTH;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the control server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Unix socket to listen on.
    pub socket_path: PathBuf,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Idle time after which a connection is closed.
    pub recv_timeout: Duration,
    /// Width of the frame length prefix in bytes.
    pub prefix_width: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            max_connections: 64,
            recv_timeout: Duration::from_secs(120),
            prefix_width: DEFAULT_PREFIX_WIDTH,
        }
    }

    /// Sets the maximum concurrent connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the idle receive timeout.
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Sets the length prefix width.
    pub fn with_prefix_width(mut self, width: usize) -> Self {
        self.prefix_width = width;
        self
    }
}

/// Configuration for the lease table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseConfig {
    /// Lifetime granted by each `lock`.
    pub ttl: Duration,
    /// How long an expired lease lingers before it is collected.
    pub grace: Duration,
}

impl LeaseConfig {
    /// Creates a lease configuration.
    pub fn new(ttl: Duration, grace: Duration) -> Self {
        Self { ttl, grace }
    }
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(5 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let config = ServerConfig::new("/tmp/gm.sock");
        assert_eq!(config.max_connections, 64);
        assert_eq!(config.recv_timeout, Duration::from_secs(120));
        assert_eq!(config.prefix_width, 2);
    }

    #[test]
    fn server_builder() {
        let config = ServerConfig::new("/tmp/gm.sock")
            .with_max_connections(2)
            .with_recv_timeout(Duration::from_millis(500))
            .with_prefix_width(4);
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.recv_timeout, Duration::from_millis(500));
        assert_eq!(config.prefix_width, 4);
    }

    #[test]
    fn lease_defaults() {
        let config = LeaseConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(60));
        assert_eq!(config.grace, Duration::from_secs(300));
    }
}
