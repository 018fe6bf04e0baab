//! Self-healing point-to-point links with COBS framing.
//!
//! framelink carries discrete binary messages between two processes over
//! TCP, UDP, or Bluetooth RFCOMM. Messages are byte-stuffed with COBS so a
//! `0x00` delimiter can mark frame boundaries; a receiver joining mid-stream
//! resynchronizes at the next delimiter, and a dropped link is rebuilt
//! automatically.
//!
//! # Crate Structure
//!
//! - [`transport`]: Endpoints, listeners, and the owned `Link` type
//! - [`frame`]: COBS codec plus blocking frame reader and writer
//! - [`peer`]: Connection manager with reconnect and resync (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use framelink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use framelink_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use framelink_peer::*;
}
