use std::fmt;

/// Lifecycle of a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session. Initial state, and the state after any link failure.
    Disconnected,
    /// Establishing a link, retrying until it succeeds.
    Connecting,
    /// Stream link is up; discarding bytes up to the first delimiter.
    Resyncing,
    /// Frames can be sent and received.
    Connected,
    /// Terminal. The link is closed and no reconnects will happen.
    ShuttingDown,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Resyncing => "resyncing",
            Self::Connected => "connected",
            Self::ShuttingDown => "shutting-down",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters kept across the life of a manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Establishment attempts, successful or not.
    pub attempts: u64,
    /// Sessions that reached `Connected`.
    pub sessions: u64,
    /// Sessions established after the first one.
    pub reconnects: u64,
    pub frames_sent: u64,
    pub frames_received: u64,
    /// Frames dropped because they failed to decode or were oversized.
    pub decode_failures: u64,
}
