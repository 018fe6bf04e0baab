use std::time::Duration;

use framelink_transport::{Endpoint, Link};
use tracing::debug;

use crate::config::DEFAULT_CONNECT_TIMEOUT;
use crate::error::Result;
use crate::establish::Establish;

/// Dials a remote endpoint (initiator role).
#[derive(Debug, Clone)]
pub struct Connector {
    endpoint: Endpoint,
    timeout: Option<Duration>,
}

impl Connector {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            timeout: Some(DEFAULT_CONNECT_TIMEOUT),
        }
    }

    /// Override the per-attempt connect timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Establish for Connector {
    type Link = Link;

    fn establish(&mut self) -> Result<Link> {
        debug!(endpoint = %self.endpoint, "connecting");
        Ok(Link::connect(&self.endpoint, self.timeout)?)
    }

    fn describe(&self) -> String {
        format!("connect {}", self.endpoint)
    }
}
