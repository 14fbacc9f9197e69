//! Connection lifecycle states, published through a `tokio::sync::watch` channel.

use std::fmt;

/// Where the connection manager currently is.
///
/// ```text
/// Disconnected -> Connecting -> Authenticating -> Ready -> Disconnected
///                     ^                                        |
///                     +------------- Reconnecting <------------+
/// ```
///
/// `Closed` follows an explicit close; `Failed` means the reconnect budget ran out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
    Reconnecting,
    Closed,
    Failed,
}

impl ConnectionState {
    /// No further transitions will happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Ready => "ready",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
