//! Request dispatch for the control socket.

use crate::lease::LeaseLockTable;
use gitmount_config::{ConfigLoader, ConfigResolver, ConfigResult};
use gitmount_protocol::{ControlRequest, ControlResponse, InfoResponse};
use std::sync::Arc;
use tracing::{debug, warn};

/// Identity of one accepted connection; doubles as its lease name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Identity for the `n`th accepted connection.
    pub fn new(n: u64) -> Self {
        Self(format!("conn-{n}"))
    }

    /// The identity text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supplies the fields of an `info` reply.
pub trait InstanceInfo: Send + Sync {
    /// Describes the mount. `held` is filled in by the handler.
    fn info(&self) -> InfoResponse;
}

/// Resolves configuration keys for `getConfig`.
pub trait ConfigLookup: Send + Sync {
    /// Resolves `key` to its value text.
    fn lookup(&self, key: &str) -> ConfigResult<Option<String>>;
}

impl<L: ConfigLoader> ConfigLookup for ConfigResolver<L> {
    fn lookup(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get(key)
    }
}

/// Maps decoded requests to replies.
pub struct RequestHandler {
    leases: Arc<LeaseLockTable>,
    config: Arc<dyn ConfigLookup>,
    info: Arc<dyn InstanceInfo>,
}

impl RequestHandler {
    /// Creates a handler.
    pub fn new(
        leases: Arc<LeaseLockTable>,
        config: Arc<dyn ConfigLookup>,
        info: Arc<dyn InstanceInfo>,
    ) -> Self {
        Self {
            leases,
            config,
            info,
        }
    }

    /// The lease table requests act on.
    pub fn leases(&self) -> &Arc<LeaseLockTable> {
        &self.leases
    }

    /// Handles one request from `conn`.
    pub fn handle(&self, conn: &ConnectionId, request: &ControlRequest) -> ControlResponse {
        debug!(%conn, ?request, "control request");
        match request {
            ControlRequest::Ping => ControlResponse::ok().field("message", "pong"),
            ControlRequest::Lock => {
                self.leases.acquire(conn.as_str());
                ControlResponse::ok().field("name", conn.as_str())
            }
            ControlRequest::Unlock => {
                let released = self.leases.release(conn.as_str());
                if !released {
                    debug!(%conn, "unlock without a lease");
                }
                ControlResponse::ok().field("released", if released { "true" } else { "false" })
            }
            ControlRequest::Info => {
                let mut info = self.info.info();
                info.held = self.leases.is_held_at(std::time::Instant::now());
                info.to_response()
            }
            ControlRequest::GetConfig { key } => match self.config.lookup(key) {
                Ok(Some(value)) => ControlResponse::ok().field(key.clone(), value),
                Ok(None) => ControlResponse::ok(),
                Err(e) => {
                    warn!(%key, error = %e, "config lookup failed");
                    ControlResponse::error(e.to_string())
                }
            },
            ControlRequest::Unknown(action) => {
                debug!(%conn, %action, "unknown action");
                ControlResponse::unknown_command()
            }
        }
    }
}

impl std::fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandler")
            .field("leases", &self.leases)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LeaseConfig;
    use gitmount_config::ConfigError;
    use gitmount_protocol::STATUS_UNKNOWN_COMMAND;
    use std::collections::HashMap;
    use std::path::Path;

    struct Fixed(HashMap<String, String>);

    impl ConfigLookup for Fixed {
        fn lookup(&self, key: &str) -> ConfigResult<Option<String>> {
            if key == "broken" {
                return Err(ConfigError::parse("expected value", Path::new("/etc/gitmount/config.json"), 3));
            }
            Ok(self.0.get(key).cloned())
        }
    }

    struct Mount;

    impl InstanceInfo for Mount {
        fn info(&self) -> InfoResponse {
            InfoResponse {
                origin: "origin".into(),
                branch: "master".into(),
                root: "/srv/notes".into(),
                path: "/mnt/notes".into(),
                merge_needed: false,
                held: false,
            }
        }
    }

    fn handler() -> RequestHandler {
        let config = Fixed(HashMap::from([("editor".to_string(), "vi".to_string())]));
        RequestHandler::new(
            LeaseLockTable::new(LeaseConfig::default()).unwrap(),
            Arc::new(config),
            Arc::new(Mount),
        )
    }

    #[test]
    fn ping_and_unknown() {
        let h = handler();
        let conn = ConnectionId::new(1);
        let pong = h.handle(&conn, &ControlRequest::Ping);
        assert!(pong.is_ok());
        assert_eq!(pong.get("message"), Some("pong"));
        let r = h.handle(&conn, &ControlRequest::Unknown("reboot".into()));
        assert_eq!(r.status(), STATUS_UNKNOWN_COMMAND);
    }

    #[test]
    fn unlock_reports_whether_a_lease_was_released() {
        let h = handler();
        let owner = ConnectionId::new(3);
        let stranger = ConnectionId::new(4);
        h.handle(&owner, &ControlRequest::Lock);

        let r = h.handle(&stranger, &ControlRequest::Unlock);
        assert!(r.is_ok());
        assert_eq!(r.get("released"), Some("false"));
        assert_eq!(h.leases().len(), 1);

        let r = h.handle(&owner, &ControlRequest::Unlock);
        assert_eq!(r.get("released"), Some("true"));
        assert!(h.leases().is_empty());
    }

    #[test]
    fn lock_uses_connection_identity() {
        let h = handler();
        let conn = ConnectionId::new(7);
        let r = h.handle(&conn, &ControlRequest::Lock);
        assert_eq!(r.get("name"), Some("conn-7"));
        h.handle(&conn, &ControlRequest::Lock);
        assert_eq!(h.leases().len(), 1);

        let info = InfoResponse::from_response(&h.handle(&conn, &ControlRequest::Info)).unwrap();
        assert!(info.held);
        assert_eq!(info.root, "/srv/notes");

        assert!(h.handle(&conn, &ControlRequest::Unlock).is_ok());
        assert!(h.leases().is_empty());
    }

    #[test]
    fn get_config_replies() {
        let h = handler();
        let conn = ConnectionId::new(1);
        let found = h.handle(&conn, &ControlRequest::GetConfig { key: "editor".into() });
        assert!(found.is_ok());
        assert_eq!(found.get("editor"), Some("vi"));

        let missing = h.handle(&conn, &ControlRequest::GetConfig { key: "pager".into() });
        assert!(missing.is_ok());
        assert_eq!(missing.get("pager"), None);

        let broken = h.handle(&conn, &ControlRequest::GetConfig { key: "broken".into() });
        assert_eq!(broken.status(), "error");
        assert!(broken.get("message").unwrap().contains("config.json(3)"));
    }
}
