//! Connection lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting for a backoff timer before the next attempt
    Reconnecting,
    /// Retry budget exhausted; only an explicit `connect()` leaves this state
    Error,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// States from which an explicit `connect()` starts a fresh attempt
    pub fn is_idle(self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Reconnecting => "RECONNECTING",
            Self::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// One recorded state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: ConnectionState,
    pub to: ConnectionState,
    /// Reconnect attempt number at the time of the change
    pub attempt: u32,
}
