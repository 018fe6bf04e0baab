use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::traits::Link;

pub(crate) fn resolve(address: &str) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = address
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            address: address.to_string(),
            source,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(TransportError::Resolve {
            address: address.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"),
        });
    }
    Ok(addrs)
}

/// Connect to a TCP endpoint, trying each resolved address in turn.
pub(crate) fn connect(endpoint: &Endpoint, timeout: Option<Duration>) -> Result<Link> {
    let mut last_err = None;
    for addr in resolve(endpoint.address())? {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                debug!(%addr, "connected tcp link");
                return Ok(Link::from_tcp(stream, format!("tcp://{addr}")));
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(TransportError::Connect {
        endpoint: endpoint.to_string(),
        source: last_err.unwrap_or_else(|| std::io::Error::other("no address attempted")),
    })
}

/// A bound TCP listener accepting one peer at a time.
pub(crate) struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    pub(crate) fn bind(endpoint: &Endpoint) -> Result<Self> {
        let bind_err = |source| TransportError::Bind {
            endpoint: endpoint.to_string(),
            source,
        };
        let addrs = resolve(endpoint.address())?;
        // std enables SO_REUSEADDR on Unix listeners, so a restarted acceptor
        // can rebind while old connections sit in TIME_WAIT.
        let listener = TcpListener::bind(&addrs[..]).map_err(bind_err)?;
        #[cfg(target_os = "linux")]
        shrink_backlog(&listener).map_err(bind_err)?;
        let local = listener.local_addr().map_err(bind_err)?;
        info!(%local, "listening on tcp");
        Ok(Self { listener })
    }

    pub(crate) fn accept(&self) -> Result<Link> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted tcp connection");
        Ok(Link::from_tcp(stream, format!("tcp://{peer}")))
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }
}

/// std listens with a backlog of 128. Linux applies a repeated `listen` to an
/// already listening socket, which caps waiting peers at one.
#[cfg(target_os = "linux")]
fn shrink_backlog(listener: &TcpListener) -> std::io::Result<()> {
    use std::os::fd::AsRawFd;

    // SAFETY: the descriptor is a listening socket owned by `listener`.
    if unsafe { libc::listen(listener.as_raw_fd(), 1) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}
