//! Payload codecs.
//!
//! A payload is a flat string-to-string mapping. The default wire form is
//! newline separated `key:value` lines. Values may contain `:` (only the first
//! one on a line separates key from value) but nothing may contain a newline,
//! and keys may not contain `:`. There is no escaping.

use crate::error::{ProtocolError, ProtocolResult};
use std::collections::BTreeMap;

/// A decoded control message.
pub type Message = BTreeMap<String, String>;

/// Converts between payload bytes and a [`Message`].
pub trait PayloadCodec: Send + Sync {
    /// Encodes a message into payload bytes.
    fn encode(&self, message: &Message) -> ProtocolResult<Vec<u8>>;

    /// Decodes payload bytes into a message.
    fn decode(&self, payload: &[u8]) -> ProtocolResult<Message>;
}

/// The `key:value\n` line codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCodec;

impl PayloadCodec for LineCodec {
    fn encode(&self, message: &Message) -> ProtocolResult<Vec<u8>> {
        let mut out = String::new();
        for (key, value) in message {
            if key.contains(':') {
                return Err(ProtocolError::InvalidField {
                    field: key.clone(),
                    reason: "key contains ':'",
                });
            }
            if key.contains('\n') || value.contains('\n') {
                return Err(ProtocolError::InvalidField {
                    field: key.clone(),
                    reason: "newline in key or value",
                });
            }
            out.push_str(key);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
        Ok(out.into_bytes())
    }

    fn decode(&self, payload: &[u8]) -> ProtocolResult<Message> {
        let text = std::str::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)?;
        let mut message = Message::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let (key, value) = line.split_once(':').unwrap_or((line, ""));
            message.insert(key.to_string(), value.to_string());
        }
        Ok(message)
    }
}

/// Builds a [`Message`] from key/value pairs.
pub fn message<K, V, I>(pairs: I) -> Message
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
