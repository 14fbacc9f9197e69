//! # Error Taxonomy
//!
//! Every fallible operation in the client returns [`OtcResult`]. Transport and
//! decode failures are normally handled inside the connection task (logged, loop
//! continues); request-level failures travel back to the caller awaiting that
//! request; input-validation failures are raised before any bytes are sent.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::connection::state::ConnectionState;
use crate::model::enums::OtcErrorCode;

/// Error types for the OTC websocket client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OtcError {
    /// Malformed or unparseable wire bytes.
    #[error("Decode failure: {0}")]
    Decode(String),
    /// A model value could not be put on the wire.
    #[error("Encode failure: {0}")]
    Encode(String),
    /// The server answered with a structured error response.
    #[error("Server error {code}: {message}")]
    Protocol {
        /// The error code sent by the server.
        code: OtcErrorCode,
        /// The human readable message sent by the server.
        message: String,
    },
    /// The transport failed or was closed while the request was in flight.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
    /// A request was awaited past its deadline.
    #[error("Request {0} timed out")]
    Timeout(String),
    /// Caller supplied identifiers could not be parsed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The client is not ready to accept outbound messages.
    #[error("Client not ready ({0}), message dropped")]
    NotReady(ConnectionState),
    /// The outbound queue is at capacity.
    #[error("Outbound queue full, message dropped")]
    QueueFull,
    /// Transport-level error from the websocket library.
    #[error("Transport error: {0}")]
    Transport(String),
    /// Consecutive reconnect attempts exceeded the configured budget.
    #[error("Reconnect budget exhausted after {0} attempts")]
    RetriesExhausted(u32),
    /// Configuration could not be assembled.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl OtcError {
    /// Whether the error ends the current session (and may trigger a reconnect).
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionLost(_) | Self::Transport(_))
    }
}

impl From<tungstenite::Error> for OtcError {
    fn from(error: tungstenite::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for OtcError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error.to_string())
    }
}

impl From<prost::DecodeError> for OtcError {
    fn from(error: prost::DecodeError) -> Self {
        Self::Decode(error.to_string())
    }
}

/// Result type alias for OTC client operations.
pub type OtcResult<T> = Result<T, OtcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_renders_code_and_message() {
        let err = OtcError::Protocol {
            code: OtcErrorCode::Forbidden,
            message: "no permissions for product foobar".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Server error forbidden: no permissions for product foobar"
        );
    }

    #[test]
    fn connection_errors_are_classified() {
        assert!(OtcError::ConnectionLost("eof".into()).is_connection_error());
        assert!(OtcError::Transport("reset".into()).is_connection_error());
        assert!(!OtcError::Timeout("abc".into()).is_connection_error());
    }
}
