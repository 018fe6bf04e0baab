use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::endpoint::{Endpoint, Protocol, TransportKind};
use crate::error::{Result, TransportError};
use crate::udp::UdpLink;

/// A connected point-to-point link.
///
/// Reads follow the stream contract for stream links (`Ok(0)` means the peer
/// closed the connection) and the datagram contract for datagram links (one
/// read returns one datagram, truncated to the buffer size).
pub trait Transport: Read + Write + Send + Sized {
    /// Stream or datagram semantics.
    fn kind(&self) -> TransportKind;

    /// Create a second handle to the same underlying socket.
    fn try_clone(&self) -> Result<Self>;

    /// Shut the link down and release the socket.
    ///
    /// Closing an already-closed link is a no-op.
    fn close(&mut self) -> Result<()>;

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    /// Human-readable description of the link for diagnostics.
    fn label(&self) -> String;
}

/// A connected TCP, UDP, or RFCOMM link.
pub struct Link {
    inner: Option<LinkInner>,
    label: String,
}

enum LinkInner {
    Tcp(TcpStream),
    Udp(UdpLink),
    #[cfg(target_os = "linux")]
    Rfcomm(crate::rfcomm::RfcommStream),
}

impl Link {
    /// Actively connect to `endpoint` (initiator role).
    ///
    /// `timeout` bounds TCP connection establishment; UDP "connects" are
    /// local-only and RFCOMM uses the kernel's page timeout.
    pub fn connect(endpoint: &Endpoint, timeout: Option<Duration>) -> Result<Self> {
        match endpoint.protocol() {
            Protocol::Tcp => crate::tcp::connect(endpoint, timeout),
            Protocol::Udp => crate::udp::connect(endpoint),
            Protocol::Rfcomm => {
                #[cfg(target_os = "linux")]
                {
                    let _ = timeout;
                    crate::rfcomm::connect(endpoint)
                }
                #[cfg(not(target_os = "linux"))]
                {
                    let _ = timeout;
                    Err(TransportError::Unsupported("bluetooth RFCOMM"))
                }
            }
        }
    }

    pub(crate) fn from_tcp(stream: TcpStream, label: String) -> Self {
        Self {
            inner: Some(LinkInner::Tcp(stream)),
            label,
        }
    }

    pub(crate) fn from_udp(socket: UdpLink, label: String) -> Self {
        Self {
            inner: Some(LinkInner::Udp(socket)),
            label,
        }
    }

    #[cfg(target_os = "linux")]
    pub(crate) fn from_rfcomm(stream: crate::rfcomm::RfcommStream, label: String) -> Self {
        Self {
            inner: Some(LinkInner::Rfcomm(stream)),
            label,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    fn inner_mut(&mut self) -> io::Result<&mut LinkInner> {
        self.inner.as_mut().ok_or_else(closed_io_error)
    }

    fn inner_ref(&self) -> Result<&LinkInner> {
        self.inner.as_ref().ok_or(TransportError::Closed)
    }
}

fn closed_io_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "link closed")
}

impl Read for Link {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner_mut()? {
            LinkInner::Tcp(stream) => stream.read(buf),
            LinkInner::Udp(socket) => socket.recv(buf),
            #[cfg(target_os = "linux")]
            LinkInner::Rfcomm(stream) => stream.read(buf),
        }
    }
}

impl Write for Link {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner_mut()? {
            LinkInner::Tcp(stream) => stream.write(buf),
            LinkInner::Udp(socket) => socket.send(buf),
            #[cfg(target_os = "linux")]
            LinkInner::Rfcomm(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner_mut()? {
            LinkInner::Tcp(stream) => stream.flush(),
            LinkInner::Udp(_) => Ok(()),
            #[cfg(target_os = "linux")]
            LinkInner::Rfcomm(stream) => stream.flush(),
        }
    }
}

impl Transport for Link {
    fn kind(&self) -> TransportKind {
        match &self.inner {
            Some(LinkInner::Udp(_)) => TransportKind::Datagram,
            _ => TransportKind::Stream,
        }
    }

    fn try_clone(&self) -> Result<Self> {
        let inner = match self.inner_ref()? {
            LinkInner::Tcp(stream) => LinkInner::Tcp(stream.try_clone()?),
            LinkInner::Udp(socket) => LinkInner::Udp(socket.try_clone()?),
            #[cfg(target_os = "linux")]
            LinkInner::Rfcomm(stream) => LinkInner::Rfcomm(stream.try_clone()?),
        };
        Ok(Self {
            inner: Some(inner),
            label: self.label.clone(),
        })
    }

    fn close(&mut self) -> Result<()> {
        let Some(inner) = self.inner.take() else {
            return Ok(());
        };
        debug!(link = %self.label, "closing link");
        let shutdown = match &inner {
            LinkInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
            LinkInner::Udp(_) => Ok(()),
            #[cfg(target_os = "linux")]
            LinkInner::Rfcomm(stream) => stream.shutdown(),
        };
        // A peer that already hung up leaves the socket unconnected; the
        // descriptor is still released when `inner` drops.
        if let Err(err) = shutdown {
            if err.kind() != io::ErrorKind::NotConnected {
                debug!(link = %self.label, error = %err, "socket shutdown failed");
            }
        }
        drop(inner);
        Ok(())
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match self.inner_ref()? {
            LinkInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            LinkInner::Udp(socket) => socket.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(target_os = "linux")]
            LinkInner::Rfcomm(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match self.inner_ref()? {
            LinkInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            LinkInner::Udp(socket) => socket.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(target_os = "linux")]
            LinkInner::Rfcomm(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            Some(LinkInner::Tcp(_)) => "tcp",
            Some(LinkInner::Udp(_)) => "udp",
            #[cfg(target_os = "linux")]
            Some(LinkInner::Rfcomm(_)) => "rfcomm",
            None => "closed",
        };
        f.debug_struct("Link")
            .field("type", &kind)
            .field("label", &self.label)
            .finish()
    }
}
