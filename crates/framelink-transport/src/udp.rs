use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::tcp::resolve;
use crate::traits::Link;

/// One end of a UDP conversation.
///
/// An initiator socket is `connect`ed to its peer. An acceptor socket is only
/// bound; it replies to whichever address sent the most recent datagram.
pub(crate) struct UdpLink {
    socket: UdpSocket,
    connected: bool,
    reply_to: Arc<Mutex<Option<SocketAddr>>>,
}

impl UdpLink {
    fn new(socket: UdpSocket, connected: bool) -> Self {
        Self {
            socket,
            connected,
            reply_to: Arc::new(Mutex::new(None)),
        }
    }

    fn reply_to(&self) -> MutexGuard<'_, Option<SocketAddr>> {
        match self.reply_to.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Receive one datagram. Anything beyond `buf.len()` is discarded.
    pub(crate) fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.connected {
            return self.socket.recv(buf);
        }
        let (n, from) = self.socket.recv_from(buf)?;
        let mut reply_to = self.reply_to();
        if *reply_to != Some(from) {
            trace!(%from, "udp peer address learned");
            *reply_to = Some(from);
        }
        Ok(n)
    }

    /// Send `buf` as a single datagram.
    pub(crate) fn send(&self, buf: &[u8]) -> io::Result<usize> {
        let sent = if self.connected {
            self.socket.send(buf)?
        } else {
            let peer = (*self.reply_to()).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotConnected,
                    "no udp peer has sent a datagram yet",
                )
            })?;
            self.socket.send_to(buf, peer)?
        };
        if sent != buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("datagram truncated on send ({sent} of {} bytes)", buf.len()),
            ));
        }
        Ok(sent)
    }

    pub(crate) fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            socket: self.socket.try_clone()?,
            connected: self.connected,
            reply_to: Arc::clone(&self.reply_to),
        })
    }

    pub(crate) fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }

    pub(crate) fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_write_timeout(timeout)
    }
}

/// Bind an ephemeral local port and connect it to the peer endpoint.
pub(crate) fn connect(endpoint: &Endpoint) -> Result<Link> {
    let connect_err = |source| TransportError::Connect {
        endpoint: endpoint.to_string(),
        source,
    };
    let peer = resolve(endpoint.address())?[0];
    let local = if peer.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let socket = UdpSocket::bind(local).map_err(connect_err)?;
    socket.connect(peer).map_err(connect_err)?;
    debug!(%peer, "connected udp link");
    Ok(Link::from_udp(
        UdpLink::new(socket, true),
        format!("udp://{peer}"),
    ))
}

/// A bound UDP socket that hands out acceptor links.
///
/// The socket stays bound across reconnects; each accepted link starts
/// without a known reply address.
pub(crate) struct UdpAcceptor {
    socket: UdpSocket,
}

impl UdpAcceptor {
    pub(crate) fn bind(endpoint: &Endpoint) -> Result<Self> {
        let bind_err = |source| TransportError::Bind {
            endpoint: endpoint.to_string(),
            source,
        };
        let addrs = resolve(endpoint.address())?;
        let socket = UdpSocket::bind(&addrs[..]).map_err(bind_err)?;
        let local = socket.local_addr().map_err(bind_err)?;
        info!(%local, "bound udp socket");
        Ok(Self { socket })
    }

    pub(crate) fn accept(&self) -> Result<Link> {
        let socket = self.socket.try_clone().map_err(TransportError::Accept)?;
        let label = match socket.local_addr() {
            Ok(local) => format!("udp://{local}"),
            Err(_) => "udp://unbound".to_string(),
        };
        Ok(Link::from_udp(UdpLink::new(socket, false), label))
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}
