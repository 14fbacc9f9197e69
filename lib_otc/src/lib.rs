//! # lib_otc
//!
//! Client-side protocol engine for the OTC market-data and order websocket API.
//!
//! The server speaks either a binary protocol-buffer encoding or JSON text.
//! [`OtcClient`] hides the difference: it connects, authenticates, keeps
//! subscriptions alive across reconnects and hands every inbound response and
//! channel message to an [`OtcHandler`].

#![forbid(unsafe_code)]

/// Wire encodings.
pub mod codec;
/// Correlator, subscription tracker and dispatcher.
pub mod core;
/// Public client and connection lifecycle.
pub mod connection;
/// Error taxonomy.
pub mod error;
/// Typed protocol messages.
pub mod model;

/// Layered settings (defaults, JSON file, environment, CLI).
#[cfg(feature = "configs")]
pub mod configs;
/// Tracing subscriber bootstrap.
#[cfg(feature = "loggers")]
pub mod loggers;

pub use crate::codec::{codec_for, Codec, Encoding, Frame};
pub use crate::connection::{ClientConfig, ConnectionState, Connector, OtcClient};
pub use crate::core::{FnHandler, LoggingHandler, OtcHandler, SubscriptionState};
pub use crate::error::{OtcError, OtcResult};
pub use crate::model::*;
