//! Connection lifecycle states published to consumers.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// Lifecycle state of the event stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport is open. Either never connected, lost (a reconnect may be
    /// pending), or closed by the caller.
    #[default]
    Disconnected,
    /// A transport is being opened.
    Connecting,
    /// A transport is open and frames are being delivered.
    Connected,
}

impl ConnectionState {
    /// `true` while a transport is open or being opened.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// Stable label for logs and status output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl Display for ConnectionState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connecting_and_connected_are_active() {
        assert!(!ConnectionState::Disconnected.is_active());
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Connected.is_active());
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn labels_match_serde_names() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
        ] {
            let json = serde_json::to_value(state).expect("serializes");
            assert_eq!(json, serde_json::Value::String(state.to_string()));
        }
    }
}
