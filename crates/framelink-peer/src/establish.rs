use framelink_transport::{Link, Transport};

use crate::config::{PeerConfig, Role};
use crate::connector::Connector;
use crate::error::Result;
use crate::listener::Acceptor;

/// Produces one fresh link per call. The manager calls this in its retry loop.
pub trait Establish {
    type Link: Transport;

    /// Make one attempt. Errors are retried by the caller.
    fn establish(&mut self) -> Result<Self::Link>;

    /// Where links come from, for logs.
    fn describe(&self) -> String;
}

/// Role-selected establisher over real sockets.
#[derive(Debug)]
pub enum LinkEstablisher {
    Connect(Connector),
    Accept(Acceptor),
}

impl LinkEstablisher {
    pub fn from_config(config: &PeerConfig) -> Self {
        match config.role {
            Role::Initiator => Self::Connect(
                Connector::new(config.endpoint.clone()).with_timeout(config.connect_timeout),
            ),
            Role::Acceptor => Self::Accept(Acceptor::new(config.endpoint.clone())),
        }
    }
}

impl Establish for LinkEstablisher {
    type Link = Link;

    fn establish(&mut self) -> Result<Link> {
        match self {
            Self::Connect(connector) => connector.establish(),
            Self::Accept(acceptor) => acceptor.establish(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Connect(connector) => connector.describe(),
            Self::Accept(acceptor) => acceptor.describe(),
        }
    }
}
