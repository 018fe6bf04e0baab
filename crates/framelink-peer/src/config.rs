use std::time::Duration;

use framelink_frame::FrameConfig;
use framelink_transport::Endpoint;

/// Default pause between failed connection attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Default bound on a single stream connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Which side of the link this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Dials the remote endpoint.
    Initiator,
    /// Binds the local endpoint and waits for the peer.
    Acceptor,
}

/// When a new stream session discards stale bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncMode {
    /// Right after the link is established, before reporting `Connected`.
    Eager,
    /// On the first receive of the session.
    Lazy,
}

/// What calls do while no session is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitMode {
    /// Reconnect inside the call and carry on.
    #[default]
    Block,
    /// Return `NotConnected` / `Disconnected` and let the caller decide.
    FailFast,
}

/// Configuration for a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub role: Role,
    pub endpoint: Endpoint,
    /// Pause between establishment attempts. Default: 3 s.
    pub retry_delay: Duration,
    /// Per-attempt bound for stream connects. Default: 10 s.
    pub connect_timeout: Option<Duration>,
    pub wait_mode: WaitMode,
    /// Default: eager for acceptors, lazy for initiators.
    pub resync: ResyncMode,
    pub frame: FrameConfig,
}

impl PeerConfig {
    /// Configuration for a process that dials `endpoint`.
    pub fn initiator(endpoint: Endpoint) -> Self {
        Self::new(Role::Initiator, endpoint)
    }

    /// Configuration for a process that listens on `endpoint`.
    pub fn acceptor(endpoint: Endpoint) -> Self {
        Self::new(Role::Acceptor, endpoint)
    }

    fn new(role: Role, endpoint: Endpoint) -> Self {
        let resync = match role {
            Role::Acceptor => ResyncMode::Eager,
            Role::Initiator => ResyncMode::Lazy,
        };
        Self {
            role,
            endpoint,
            retry_delay: DEFAULT_RETRY_DELAY,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            wait_mode: WaitMode::default(),
            resync,
            frame: FrameConfig::default(),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_wait_mode(mut self, mode: WaitMode) -> Self {
        self.wait_mode = mode;
        self
    }

    pub fn with_resync(mut self, mode: ResyncMode) -> Self {
        self.resync = mode;
        self
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    /// Bound every receive; expiry surfaces as `PeerError::Timeout`.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.frame.read_timeout = timeout;
        self
    }
}
