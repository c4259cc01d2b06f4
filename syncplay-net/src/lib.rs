//! Network layer for the syncplay client.
//!
//! The server pushes newline-delimited JSON commands over one TCP stream.
//! This crate turns that stream into [`Command`](syncplay_types::Command)
//! values:
//!
//! - [`framing`]: byte accumulator that yields complete records
//! - [`protocol`]: record parser (and encoder, for test servers)
//! - [`client`]: connection lifecycle and the background reader thread

pub mod client;
pub mod framing;
pub mod protocol;

pub use client::{ClientOptions, SyncClient, SyncListener};
pub use framing::{FrameError, LineDecoder};
pub use protocol::{encode_command, parse_command, ParseError};
