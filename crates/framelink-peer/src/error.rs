/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] framelink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] framelink_frame::FrameError),

    /// No session is established and the manager is configured not to wait.
    #[error("not connected")]
    NotConnected,

    /// The session broke during the call. The manager is back in
    /// `Disconnected`; call `start()` to reconnect.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// The read timeout elapsed before a frame arrived. The session is kept.
    #[error("timed out waiting for a frame")]
    Timeout,

    /// The manager has been shut down.
    #[error("connection manager is shut down")]
    Shutdown,
}

impl PeerError {
    /// Whether retrying the same call later can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::Disconnected(_) | Self::Timeout
        )
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
