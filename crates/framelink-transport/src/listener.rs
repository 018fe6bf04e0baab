use std::net::SocketAddr;

use crate::endpoint::{Endpoint, Protocol};
use crate::error::Result;
use crate::tcp::TcpAcceptor;
use crate::traits::Link;
use crate::udp::UdpAcceptor;

/// A bound local endpoint that yields one peer [`Link`] per `accept` call.
///
/// Stream listeners use a backlog of one (TCP on Linux and RFCOMM; TCP
/// elsewhere keeps the platform default): the link layer serves a single peer
/// at a time and callers accept again only after the previous link is gone.
/// For UDP there is no handshake; `accept` returns immediately with a link
/// that learns its peer from the first datagram received.
pub struct Listener {
    inner: ListenerInner,
    endpoint: Endpoint,
}

enum ListenerInner {
    Tcp(TcpAcceptor),
    Udp(UdpAcceptor),
    #[cfg(target_os = "linux")]
    Rfcomm(crate::rfcomm::RfcommAcceptor),
}

impl Listener {
    /// Bind and listen on `endpoint`.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        let inner = match endpoint.protocol() {
            Protocol::Tcp => ListenerInner::Tcp(TcpAcceptor::bind(endpoint)?),
            Protocol::Udp => ListenerInner::Udp(UdpAcceptor::bind(endpoint)?),
            #[cfg(target_os = "linux")]
            Protocol::Rfcomm => {
                ListenerInner::Rfcomm(crate::rfcomm::RfcommAcceptor::bind(endpoint)?)
            }
            #[cfg(not(target_os = "linux"))]
            Protocol::Rfcomm => {
                return Err(crate::error::TransportError::Unsupported("bluetooth RFCOMM"))
            }
        };
        Ok(Self {
            inner,
            endpoint: endpoint.clone(),
        })
    }

    /// Block until a peer connects (stream) or return a fresh datagram link.
    pub fn accept(&self) -> Result<Link> {
        match &self.inner {
            ListenerInner::Tcp(acceptor) => acceptor.accept(),
            ListenerInner::Udp(acceptor) => acceptor.accept(),
            #[cfg(target_os = "linux")]
            ListenerInner::Rfcomm(acceptor) => acceptor.accept(),
        }
    }

    /// The endpoint this listener was bound from.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Bound socket address for IP listeners (useful after binding port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.inner {
            ListenerInner::Tcp(acceptor) => acceptor.local_addr(),
            ListenerInner::Udp(acceptor) => acceptor.local_addr(),
            #[cfg(target_os = "linux")]
            ListenerInner::Rfcomm(_) => None,
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> String {
        match &self.inner {
            ListenerInner::Tcp(_) | ListenerInner::Udp(_) => match self.local_addr() {
                Some(addr) => format!("{}://{addr}", self.endpoint.protocol().scheme()),
                None => self.endpoint.to_string(),
            },
            #[cfg(target_os = "linux")]
            ListenerInner::Rfcomm(acceptor) => acceptor.label(),
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("endpoint", &self.endpoint.to_string())
            .finish()
    }
}
