use std::net::SocketAddr;

use framelink_transport::{Endpoint, Link, Listener, TransportError};
use tracing::{debug, info};

use crate::error::Result;
use crate::establish::Establish;

/// Waits for the remote peer on a local endpoint (acceptor role).
///
/// The listener is bound on the first attempt and kept across sessions, so a
/// reconnecting peer finds the port open. It is dropped and rebound only if
/// accepting fails at the listener level.
#[derive(Debug)]
pub struct Acceptor {
    endpoint: Endpoint,
    listener: Option<Listener>,
}

impl Acceptor {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            listener: None,
        }
    }

    /// Bind now instead of on the first `establish`.
    pub fn bind(endpoint: Endpoint) -> Result<Self> {
        let mut acceptor = Self::new(endpoint);
        acceptor.listener()?;
        Ok(acceptor)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Bound address once listening (useful after binding port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(Listener::local_addr)
    }

    fn listener(&mut self) -> Result<&Listener> {
        if self.listener.is_none() {
            let listener = Listener::bind(&self.endpoint)?;
            info!(listener = %listener.transport_name(), "listening");
            self.listener = Some(listener);
        }
        self.listener
            .as_ref()
            .ok_or_else(|| TransportError::Closed.into())
    }
}

impl Establish for Acceptor {
    type Link = Link;

    fn establish(&mut self) -> Result<Link> {
        let listener = self.listener()?;
        match listener.accept() {
            Ok(link) => {
                debug!(peer = %framelink_transport::Transport::label(&link), "accepted link");
                Ok(link)
            }
            Err(err) => {
                self.listener = None;
                Err(err.into())
            }
        }
    }

    fn describe(&self) -> String {
        format!("accept {}", self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::thread;
    use std::time::Duration;

    use framelink_transport::Transport;

    use super::*;

    #[test]
    fn keeps_listener_across_sessions() {
        let mut acceptor = Acceptor::bind("tcp://127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = acceptor.local_addr().unwrap();
        let endpoint = Endpoint::tcp(addr.to_string()).unwrap();

        let client = thread::spawn(move || {
            for msg in [b"one", b"two"] {
                let mut link = Link::connect(&endpoint, Some(Duration::from_secs(5))).unwrap();
                link.write_all(msg).unwrap();
            }
        });

        for expected in [b"one", b"two"] {
            let mut link = acceptor.establish().unwrap();
            let mut buf = [0u8; 3];
            link.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, expected);
            assert_eq!(acceptor.local_addr(), Some(addr));
        }
        client.join().unwrap();
    }

    #[test]
    fn binds_lazily() {
        let acceptor = Acceptor::new("udp://127.0.0.1:0".parse().unwrap());
        assert!(acceptor.local_addr().is_none());
        assert_eq!(acceptor.describe(), "accept udp://127.0.0.1:0");
    }

    #[test]
    fn udp_accept_returns_datagram_link() {
        let mut acceptor = Acceptor::new("udp://127.0.0.1:0".parse().unwrap());
        let link = acceptor.establish().unwrap();
        assert_eq!(link.kind(), framelink_transport::TransportKind::Datagram);
        assert!(acceptor.local_addr().is_some());
    }

    #[test]
    fn bind_conflict_is_reported() {
        let first = Acceptor::bind("tcp://127.0.0.1:0".parse().unwrap()).unwrap();
        let taken = Endpoint::tcp(first.local_addr().unwrap().to_string()).unwrap();

        let mut second = Acceptor::new(taken);
        assert!(second.establish().is_err());
        assert!(second.local_addr().is_none());
    }
}
