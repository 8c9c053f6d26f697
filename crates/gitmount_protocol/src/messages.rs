//! Typed control requests and responses.

use crate::codec::Message;
use crate::error::{ProtocolError, ProtocolResult};

/// Key carrying the request action.
pub const ACTION_KEY: &str = "action";
/// Key carrying the response status.
pub const STATUS_KEY: &str = "status";
/// Status of a successful response.
pub const STATUS_OK: &str = "ok";
/// Status returned for an action with no handler.
pub const STATUS_UNKNOWN_COMMAND: &str = "Unknown Command";
/// Status returned for a malformed request.
pub const STATUS_ERROR: &str = "error";

/// A control action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Liveness probe.
    Ping,
    /// Acquire or renew the connection's lease.
    Lock,
    /// Release the connection's lease.
    Unlock,
    /// Read-only instance introspection.
    Info,
    /// Resolve a configuration key.
    GetConfig,
}

impl Action {
    /// All actions, in dispatch-table order.
    pub const ALL: [Action; 5] = [
        Action::Ping,
        Action::Lock,
        Action::Unlock,
        Action::Info,
        Action::GetConfig,
    ];

    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Ping => "ping",
            Action::Lock => "lock",
            Action::Unlock => "unlock",
            Action::Info => "info",
            Action::GetConfig => "getConfig",
        }
    }

    /// Parses a wire action name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    /// `ping`.
    Ping,
    /// `lock`.
    Lock,
    /// `unlock`.
    Unlock,
    /// `info`.
    Info,
    /// `getConfig` for `key`.
    GetConfig {
        /// Configuration key to resolve.
        key: String,
    },
    /// An action with no handler.
    Unknown(String),
}

impl ControlRequest {
    /// Returns the action, or `None` for unknown requests.
    pub fn action(&self) -> Option<Action> {
        match self {
            ControlRequest::Ping => Some(Action::Ping),
            ControlRequest::Lock => Some(Action::Lock),
            ControlRequest::Unlock => Some(Action::Unlock),
            ControlRequest::Info => Some(Action::Info),
            ControlRequest::GetConfig { .. } => Some(Action::GetConfig),
            ControlRequest::Unknown(_) => None,
        }
    }

    /// Encodes the request as a message.
    pub fn to_message(&self) -> Message {
        let mut m = Message::new();
        match self {
            ControlRequest::Unknown(name) => {
                m.insert(ACTION_KEY.into(), name.clone());
            }
            ControlRequest::GetConfig { key } => {
                m.insert(ACTION_KEY.into(), Action::GetConfig.as_str().into());
                m.insert("key".into(), key.clone());
            }
            other => {
                let action = other.action().map(|a| a.as_str()).unwrap_or_default();
                m.insert(ACTION_KEY.into(), action.into());
            }
        }
        m
    }

    /// Decodes a request message.
    ///
    /// A missing `action` decodes as [`ControlRequest::Unknown`] with an empty
    /// name. `getConfig` without a `key` is an invalid request.
    pub fn from_message(m: &Message) -> ProtocolResult<Self> {
        let name = m.get(ACTION_KEY).map(String::as_str).unwrap_or_default();
        let request = match Action::parse(name) {
            Some(Action::Ping) => ControlRequest::Ping,
            Some(Action::Lock) => ControlRequest::Lock,
            Some(Action::Unlock) => ControlRequest::Unlock,
            Some(Action::Info) => ControlRequest::Info,
            Some(Action::GetConfig) => {
                let key = m
                    .get("key")
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| ProtocolError::InvalidRequest("getConfig requires key".into()))?;
                ControlRequest::GetConfig { key: key.clone() }
            }
            None => ControlRequest::Unknown(name.to_string()),
        };
        Ok(request)
    }
}

/// A control response under construction or as received.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControlResponse {
    fields: Message,
}

impl ControlResponse {
    /// A response with the given status.
    pub fn with_status(status: impl Into<String>) -> Self {
        let mut fields = Message::new();
        fields.insert(STATUS_KEY.into(), status.into());
        Self { fields }
    }

    /// `{status: ok}`.
    pub fn ok() -> Self {
        Self::with_status(STATUS_OK)
    }

    /// `{status: "Unknown Command"}`.
    pub fn unknown_command() -> Self {
        Self::with_status(STATUS_UNKNOWN_COMMAND)
    }

    /// `{status: error, message: ..}`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_status(STATUS_ERROR).field("message", message)
    }

    /// Adds a field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Wraps a received message.
    pub fn from_message(fields: Message) -> Self {
        Self { fields }
    }

    /// The response status, empty if absent.
    pub fn status(&self) -> &str {
        self.get(STATUS_KEY).unwrap_or_default()
    }

    /// True if the status is `ok`.
    pub fn is_ok(&self) -> bool {
        self.status() == STATUS_OK
    }

    /// Looks up a field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Borrows the underlying message.
    pub fn as_message(&self) -> &Message {
        &self.fields
    }

    /// Consumes the response into its message.
    pub fn into_message(self) -> Message {
        self.fields
    }
}

/// Payload of a successful `info` response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InfoResponse {
    /// Remote name or URL the repository syncs with.
    pub origin: String,
    /// Branch being synchronized.
    pub branch: String,
    /// Repository root on disk.
    pub root: String,
    /// Mount point the filesystem is exposed at.
    pub path: String,
    /// True when a pull could not fast-forward and needs manual merging.
    pub merge_needed: bool,
    /// True while a lease suspends synchronization.
    pub held: bool,
}

impl InfoResponse {
    /// Encodes as an `ok` response.
    pub fn to_response(&self) -> ControlResponse {
        ControlResponse::ok()
            .field("origin", self.origin.clone())
            .field("branch", self.branch.clone())
            .field("root", self.root.clone())
            .field("path", self.path.clone())
            .field("merge_needed", bool_str(self.merge_needed))
            .field("held", bool_str(self.held))
    }

    /// Decodes an `info` response; `None` unless the status is `ok`.
    pub fn from_response(response: &ControlResponse) -> Option<Self> {
        if !response.is_ok() {
            return None;
        }
        let text = |k: &str| response.get(k).unwrap_or_default().to_string();
        Some(Self {
            origin: text("origin"),
            branch: text("branch"),
            root: text("root"),
            path: text("path"),
            merge_needed: response.get("merge_needed") == Some("true"),
            held: response.get("held") == Some("true"),
        })
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::message;

    #[test]
    fn action_names() {
        for action in Action::ALL {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        assert_eq!(Action::parse("getconfig"), None);
        assert_eq!(Action::GetConfig.to_string(), "getConfig");
    }

    #[test]
    fn request_roundtrip_through_message() {
        let requests = [
            ControlRequest::Ping,
            ControlRequest::Lock,
            ControlRequest::Unlock,
            ControlRequest::Info,
            ControlRequest::GetConfig {
                key: "build_host".into(),
            },
        ];
        for request in requests {
            let m = request.to_message();
            assert_eq!(ControlRequest::from_message(&m).unwrap(), request);
        }
    }

    #[test]
    fn unknown_and_missing_action() {
        let m = message([("action", "reboot")]);
        assert_eq!(
            ControlRequest::from_message(&m).unwrap(),
            ControlRequest::Unknown("reboot".into())
        );
        let empty = Message::new();
        assert_eq!(
            ControlRequest::from_message(&empty).unwrap(),
            ControlRequest::Unknown(String::new())
        );
    }

    #[test]
    fn get_config_requires_key() {
        let m = message([("action", "getConfig")]);
        let err = ControlRequest::from_message(&m).unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn info_response_fields() {
        let info = InfoResponse {
            origin: "origin".into(),
            branch: "main".into(),
            root: "/srv/repo".into(),
            path: "/mnt/repo".into(),
            merge_needed: true,
            held: false,
        };
        let response = info.to_response();
        assert_eq!(response.get("root"), Some("/srv/repo"));
        assert_eq!(InfoResponse::from_response(&response), Some(info));
        assert_eq!(
            InfoResponse::from_response(&ControlResponse::unknown_command()),
            None
        );
    }
}
