//! # gitmount Protocol
//!
//! Control protocol types and framing for gitmount.
//!
//! This crate provides:
//! - Length-prefixed framing (`FrameFormat`, `FrameDecoder`)
//! - The `key:value` line payload codec
//! - `FramedChannel` over any `Read + Write` stream
//! - Typed control requests and responses
//! - Path escaping shared by the filesystem layer and clients
//!
//! ## Wire format
//!
//! ```text
//! [length: N bytes, big-endian, value = N + payload_len][payload]
//! payload = *( key ":" value "\n" )
//! ```
//!
//! This crate performs no socket I/O of its own.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod codec;
mod error;
mod frame;
mod messages;
pub mod paths;

pub use channel::FramedChannel;
pub use codec::{message, LineCodec, Message, PayloadCodec};
pub use error::{ProtocolError, ProtocolResult};
pub use frame::{FrameDecoder, FrameFormat, DEFAULT_PREFIX_WIDTH};
pub use messages::{
    Action, ControlRequest, ControlResponse, InfoResponse, ACTION_KEY, STATUS_ERROR, STATUS_KEY,
    STATUS_OK, STATUS_UNKNOWN_COMMAND,
};
