//! Lifecycle status.

use std::fmt;

/// Lifecycle status of a connection.
///
/// Exactly one status is active at a time. `Terminated` is absorbing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ConnectionStatus {
    /// No socket; waiting for CONNECT.
    #[default]
    Disconnected,
    /// Socket created, handshake in progress.
    Connecting,
    /// Socket open; messages flow.
    Connected,
    /// Waiting out a backoff delay before the next attempt.
    Reconnecting,
    /// Close requested, waiting for the peer to acknowledge.
    Disconnecting,
    /// Shut down for good.
    Terminated,
}

impl ConnectionStatus {
    /// All statuses, in declaration order.
    pub const ALL: [ConnectionStatus; 6] = [
        ConnectionStatus::Disconnected,
        ConnectionStatus::Connecting,
        ConnectionStatus::Connected,
        ConnectionStatus::Reconnecting,
        ConnectionStatus::Disconnecting,
        ConnectionStatus::Terminated,
    ];

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Disconnecting => "disconnecting",
            ConnectionStatus::Terminated => "terminated",
        }
    }

    /// WebSocket-style ready state: 0 connecting, 1 open, 2 closing, 3 closed.
    pub fn ready_state(self) -> u8 {
        match self {
            ConnectionStatus::Connecting => 0,
            ConnectionStatus::Connected => 1,
            ConnectionStatus::Disconnecting => 2,
            ConnectionStatus::Disconnected
            | ConnectionStatus::Reconnecting
            | ConnectionStatus::Terminated => 3,
        }
    }

    /// Returns `true` for the statuses in which a socket exists.
    pub fn holds_socket(self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connecting
                | ConnectionStatus::Connected
                | ConnectionStatus::Disconnecting
        )
    }

    /// Returns `true` once terminated.
    pub fn is_terminal(self) -> bool {
        self == ConnectionStatus::Terminated
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
