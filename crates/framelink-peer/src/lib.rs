//! Self-healing point-to-point links.
//!
//! This is the "just works" layer. A [`ConnectionManager`] owns the one link
//! to the remote peer, establishes it (dialing or accepting), resynchronizes
//! the frame stream, and rebuilds the link whenever it breaks. Corrupt
//! frames are dropped without touching the connection.

pub mod config;
pub mod connector;
pub mod error;
pub mod establish;
pub mod listener;
pub mod manager;
pub mod retry;
pub mod shutdown;
pub mod state;

pub use config::{
    PeerConfig, ResyncMode, Role, WaitMode, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RETRY_DELAY,
};
pub use connector::Connector;
pub use error::{PeerError, Result};
pub use establish::{Establish, LinkEstablisher};
pub use listener::Acceptor;
pub use manager::{ConnectionManager, Received};
pub use retry::{Sleeper, ThreadSleeper};
pub use shutdown::ShutdownSignal;
pub use state::{ConnectionState, LinkStats};
