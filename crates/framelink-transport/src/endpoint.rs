use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TransportError};

/// Whether a link carries an unbounded byte stream or discrete datagrams.
///
/// Stream links need delimiter framing and resynchronization; on datagram
/// links the datagram boundary is the frame boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Stream,
    Datagram,
}

impl TransportKind {
    pub fn is_stream(self) -> bool {
        matches!(self, Self::Stream)
    }
}

/// Supported link protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    /// Bluetooth RFCOMM (Linux only).
    Rfcomm,
}

impl Protocol {
    pub fn kind(self) -> TransportKind {
        match self {
            Self::Tcp | Self::Rfcomm => TransportKind::Stream,
            Self::Udp => TransportKind::Datagram,
        }
    }

    /// URL scheme used when formatting endpoints.
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Rfcomm => "bt",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("TCP"),
            Self::Udp => f.write_str("UDP"),
            Self::Rfcomm => f.write_str("BT-RFCOMM"),
        }
    }
}

impl FromStr for Protocol {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            "bt" | "rfcomm" | "bt-rfcomm" => Ok(Self::Rfcomm),
            other => Err(TransportError::invalid_endpoint(
                s,
                format!("unknown protocol {other:?} (expected tcp, udp or bt)"),
            )),
        }
    }
}

/// A protocol plus the protocol-specific address of the remote (initiator)
/// or local (acceptor) side.
///
/// Textual form:
///
/// ```text
/// tcp://host:port
/// udp://host:port
/// bt://AA:BB:CC:DD:EE:FF/channel     (also rfcomm://)
/// ```
///
/// An empty host (`tcp://:9000`) means "all interfaces" and is normalized to
/// `0.0.0.0`. For RFCOMM acceptors, `bt://any/3` binds every local adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    protocol: Protocol,
    address: String,
}

impl Endpoint {
    /// Build an endpoint, validating the address for the protocol.
    pub fn new(protocol: Protocol, address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        let address = match protocol {
            Protocol::Tcp | Protocol::Udp => normalize_host_port(&address)?,
            Protocol::Rfcomm => {
                validate_rfcomm(&address)?;
                address
            }
        };
        Ok(Self { protocol, address })
    }

    pub fn tcp(address: impl Into<String>) -> Result<Self> {
        Self::new(Protocol::Tcp, address)
    }

    pub fn udp(address: impl Into<String>) -> Result<Self> {
        Self::new(Protocol::Udp, address)
    }

    pub fn rfcomm(device: &str, channel: u8) -> Result<Self> {
        Self::new(Protocol::Rfcomm, format!("{device}/{channel}"))
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn kind(&self) -> TransportKind {
        self.protocol.kind()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol.scheme(), self.address)
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let (scheme, address) = s
            .split_once("://")
            .ok_or_else(|| TransportError::invalid_endpoint(s, "missing scheme (e.g. tcp://)"))?;
        let protocol = scheme.parse::<Protocol>()?;
        Self::new(protocol, address).map_err(|err| match err {
            TransportError::InvalidEndpoint { reason, .. } => {
                TransportError::invalid_endpoint(s, reason)
            }
            other => other,
        })
    }
}

fn normalize_host_port(address: &str) -> Result<String> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| TransportError::invalid_endpoint(address, "expected host:port"))?;
    port.parse::<u16>().map_err(|_| {
        TransportError::invalid_endpoint(address, format!("invalid port {port:?}"))
    })?;
    if host.is_empty() {
        return Ok(format!("0.0.0.0:{port}"));
    }
    Ok(address.to_string())
}

fn validate_rfcomm(address: &str) -> Result<()> {
    let (device, channel) = address.rsplit_once('/').ok_or_else(|| {
        TransportError::invalid_endpoint(address, "expected device-address/channel")
    })?;
    let channel: u8 = channel.parse().map_err(|_| {
        TransportError::invalid_endpoint(address, format!("invalid channel {channel:?}"))
    })?;
    if !(1..=30).contains(&channel) {
        return Err(TransportError::invalid_endpoint(
            address,
            "RFCOMM channel must be in 1..=30",
        ));
    }
    if device.eq_ignore_ascii_case("any") {
        return Ok(());
    }
    let octets: Vec<&str> = device.split(':').collect();
    let well_formed = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && u8::from_str_radix(o, 16).is_ok());
    if !well_formed {
        return Err(TransportError::invalid_endpoint(
            address,
            format!("invalid bluetooth address {device:?}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_and_udp() {
        let tcp: Endpoint = "tcp://192.168.43.14:65432".parse().unwrap();
        assert_eq!(tcp.protocol(), Protocol::Tcp);
        assert_eq!(tcp.address(), "192.168.43.14:65432");
        assert_eq!(tcp.kind(), TransportKind::Stream);

        let udp: Endpoint = "UDP://localhost:64321".parse().unwrap();
        assert_eq!(udp.protocol(), Protocol::Udp);
        assert_eq!(udp.kind(), TransportKind::Datagram);
    }

    #[test]
    fn empty_host_means_all_interfaces() {
        let ep: Endpoint = "tcp://:64321".parse().unwrap();
        assert_eq!(ep.address(), "0.0.0.0:64321");
    }

    #[test]
    fn parses_rfcomm() {
        let ep: Endpoint = "bt://84:9f:b5:85:c1:91/3".parse().unwrap();
        assert_eq!(ep.protocol(), Protocol::Rfcomm);
        assert_eq!(ep.kind(), TransportKind::Stream);
        assert_eq!(ep.to_string(), "bt://84:9f:b5:85:c1:91/3");

        let any: Endpoint = "rfcomm://any/3".parse().unwrap();
        assert_eq!(any.address(), "any/3");
    }

    #[test]
    fn rejects_malformed_endpoints() {
        for input in [
            "192.168.0.1:80",
            "sctp://host:1",
            "tcp://host",
            "tcp://host:99999",
            "bt://84:9f:b5/3",
            "bt://84:9f:b5:85:c1:91/0",
            "bt://84:9f:b5:85:c1:zz/3",
        ] {
            let err = input.parse::<Endpoint>().unwrap_err();
            assert!(
                matches!(err, TransportError::InvalidEndpoint { .. }),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let ep = Endpoint::udp("127.0.0.1:9000").unwrap();
        let reparsed: Endpoint = ep.to_string().parse().unwrap();
        assert_eq!(ep, reparsed);
    }
}
