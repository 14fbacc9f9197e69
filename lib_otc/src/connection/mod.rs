//! # Connection
//!
//! Transport, lifecycle and the public client.

/// Public client handle and its configuration.
pub mod client;
/// The connection task: sessions, authentication and reconnect.
mod manager;
/// Connection lifecycle states.
pub mod state;
/// Pluggable websocket transport.
pub mod transport;

pub use client::{ClientConfig, OtcClient, DEFAULT_WS_URL};
pub use state::ConnectionState;
pub use transport::{Connector, FrameSink, FrameStream, TungsteniteConnector};
