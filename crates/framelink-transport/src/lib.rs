//! Point-to-point link transport.
//!
//! Provides a unified interface over the socket types framelink runs on:
//! - TCP streams
//! - UDP datagrams
//! - Bluetooth RFCOMM streams (Linux)
//!
//! This is the lowest layer of framelink. Everything else builds on top of
//! the [`Link`] type and the [`Transport`] trait provided here.

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod traits;

#[cfg(target_os = "linux")]
pub mod rfcomm;
mod tcp;
mod udp;

pub use endpoint::{Endpoint, Protocol, TransportKind};
pub use error::{Result, TransportError};
pub use listener::Listener;
pub use traits::{Link, Transport};
