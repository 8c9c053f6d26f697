//! # gitmount Control
//!
//! The local control surface of a mounted repository.
//!
//! This crate provides:
//! - `LeaseLockTable`, the gate that defers synchronization while leases are live
//! - `ControlServer`, a unix-socket server with one thread per connection
//! - `RequestHandler`, the `ping`/`lock`/`unlock`/`info`/`getConfig` dispatch
//! - `ControlClient` and `LockHold` for tools that drive an instance
//!
//! ## Key Invariants
//!
//! - A lease is keyed by its connection's identity; repeated `lock` renews it
//! - Leases survive their connection and are collected after the grace window
//! - A malformed request gets an error reply; a corrupt frame closes the connection

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod handler;
mod lease;
mod server;

pub use client::{ControlClient, LockHold, DEFAULT_CLIENT_TIMEOUT};
pub use config::{LeaseConfig, ServerConfig};
pub use error::{ControlError, ControlResult};
pub use handler::{ConfigLookup, ConnectionId, InstanceInfo, RequestHandler};
pub use lease::LeaseLockTable;
pub use server::{probe, ControlServer};
