//! Bluetooth RFCOMM stream sockets (Linux, BlueZ).
//!
//! RFCOMM is a reliable byte stream, so it shares the TCP framing path. The
//! standard library has no Bluetooth support; sockets are created through
//! `libc` and owned as [`OwnedFd`] so they close on drop.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::traits::Link;

/// `BTPROTO_RFCOMM` from `<bluetooth/bluetooth.h>`; not exported by libc.
const BTPROTO_RFCOMM: libc::c_int = 3;

/// `struct sockaddr_rc` from `<bluetooth/rfcomm.h>`.
#[repr(C)]
struct SockaddrRc {
    rc_family: libc::sa_family_t,
    rc_bdaddr: [u8; 6],
    rc_channel: u8,
}

/// A Bluetooth device address.
///
/// Stored in BlueZ `bdaddr_t` order (least significant octet first), the
/// reverse of the textual `AA:BB:CC:DD:EE:FF` form.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr([u8; 6]);

impl BdAddr {
    /// `BDADDR_ANY`: bind on every local adapter.
    pub const ANY: BdAddr = BdAddr([0; 6]);
}

impl FromStr for BdAddr {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("any") {
            return Ok(Self::ANY);
        }
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for slot in octets.iter_mut().rev() {
            let part = parts
                .next()
                .ok_or_else(|| TransportError::invalid_endpoint(s, "too few octets"))?;
            *slot = u8::from_str_radix(part, 16)
                .map_err(|_| TransportError::invalid_endpoint(s, format!("bad octet {part:?}")))?;
        }
        if parts.next().is_some() {
            return Err(TransportError::invalid_endpoint(s, "too many octets"));
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            o[5], o[4], o[3], o[2], o[1], o[0]
        )
    }
}

impl fmt::Debug for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BdAddr({self})")
    }
}

/// Device address plus RFCOMM channel, parsed from `AA:BB:CC:DD:EE:FF/3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfcommAddr {
    pub device: BdAddr,
    pub channel: u8,
}

impl RfcommAddr {
    pub fn parse(address: &str) -> Result<Self> {
        let (device, channel) = address
            .rsplit_once('/')
            .ok_or_else(|| TransportError::invalid_endpoint(address, "missing /channel"))?;
        let channel = channel.parse().map_err(|_| {
            TransportError::invalid_endpoint(address, format!("invalid channel {channel:?}"))
        })?;
        Ok(Self {
            device: device.parse()?,
            channel,
        })
    }

    fn to_sockaddr(self) -> SockaddrRc {
        SockaddrRc {
            rc_family: libc::AF_BLUETOOTH as libc::sa_family_t,
            rc_bdaddr: self.device.0,
            rc_channel: self.channel,
        }
    }
}

impl fmt::Display for RfcommAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.channel)
    }
}

fn rfcomm_socket() -> io::Result<OwnedFd> {
    // SAFETY: plain socket(2) call; the returned descriptor is checked
    // before ownership is taken.
    let fd = unsafe {
        libc::socket(
            libc::AF_BLUETOOTH,
            libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
            BTPROTO_RFCOMM,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `fd` is a freshly created descriptor owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn sockaddr_len() -> libc::socklen_t {
    std::mem::size_of::<SockaddrRc>() as libc::socklen_t
}

fn cvt(rc: libc::c_int) -> io::Result<libc::c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

/// A connected RFCOMM stream.
pub(crate) struct RfcommStream {
    file: File,
}

impl RfcommStream {
    fn from_fd(fd: OwnedFd) -> Self {
        Self {
            file: File::from(fd),
        }
    }

    pub(crate) fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            file: self.file.try_clone()?,
        })
    }

    pub(crate) fn shutdown(&self) -> io::Result<()> {
        // SAFETY: the descriptor is owned by `self.file` and open.
        cvt(unsafe { libc::shutdown(self.file.as_raw_fd(), libc::SHUT_RDWR) }).map(|_| ())
    }

    pub(crate) fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_timeout(libc::SO_RCVTIMEO, timeout)
    }

    pub(crate) fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_timeout(libc::SO_SNDTIMEO, timeout)
    }

    fn set_timeout(&self, option: libc::c_int, timeout: Option<Duration>) -> io::Result<()> {
        if timeout == Some(Duration::ZERO) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot set a zero duration timeout",
            ));
        }
        let timeout = timeout.unwrap_or(Duration::ZERO);
        let tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        // SAFETY: `tv` is a valid timeval for the duration of the call and the
        // descriptor is open.
        cvt(unsafe {
            libc::setsockopt(
                self.file.as_raw_fd(),
                libc::SOL_SOCKET,
                option,
                (&tv as *const libc::timeval).cast::<libc::c_void>(),
                std::mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        })
        .map(|_| ())
    }
}

impl Read for RfcommStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for RfcommStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Connect to a remote RFCOMM channel.
pub(crate) fn connect(endpoint: &Endpoint) -> Result<Link> {
    let connect_err = |source| TransportError::Connect {
        endpoint: endpoint.to_string(),
        source,
    };
    let addr = RfcommAddr::parse(endpoint.address())?;
    let fd = rfcomm_socket().map_err(connect_err)?;
    let sa = addr.to_sockaddr();
    // SAFETY: `sa` is a properly initialized sockaddr_rc and the length
    // matches its size.
    cvt(unsafe {
        libc::connect(
            fd.as_raw_fd(),
            (&sa as *const SockaddrRc).cast::<libc::sockaddr>(),
            sockaddr_len(),
        )
    })
    .map_err(connect_err)?;
    debug!(%addr, "connected rfcomm link");
    Ok(Link::from_rfcomm(
        RfcommStream::from_fd(fd),
        format!("bt://{addr}"),
    ))
}

/// A listening RFCOMM socket.
pub(crate) struct RfcommAcceptor {
    fd: OwnedFd,
    addr: RfcommAddr,
}

impl RfcommAcceptor {
    pub(crate) fn bind(endpoint: &Endpoint) -> Result<Self> {
        let bind_err = |source| TransportError::Bind {
            endpoint: endpoint.to_string(),
            source,
        };
        let addr = RfcommAddr::parse(endpoint.address())?;
        let fd = rfcomm_socket().map_err(bind_err)?;
        let sa = addr.to_sockaddr();
        // SAFETY: see `connect`.
        cvt(unsafe {
            libc::bind(
                fd.as_raw_fd(),
                (&sa as *const SockaddrRc).cast::<libc::sockaddr>(),
                sockaddr_len(),
            )
        })
        .map_err(bind_err)?;
        // SAFETY: the descriptor is a bound stream socket.
        cvt(unsafe { libc::listen(fd.as_raw_fd(), 1) }).map_err(bind_err)?;
        info!(%addr, "listening on rfcomm");
        Ok(Self { fd, addr })
    }

    pub(crate) fn accept(&self) -> Result<Link> {
        let mut peer = SockaddrRc {
            rc_family: 0,
            rc_bdaddr: [0; 6],
            rc_channel: 0,
        };
        let mut len = sockaddr_len();
        let fd = loop {
            // SAFETY: `peer` and `len` are valid writable locations sized for
            // a sockaddr_rc.
            let rc = unsafe {
                libc::accept4(
                    self.fd.as_raw_fd(),
                    (&mut peer as *mut SockaddrRc).cast::<libc::sockaddr>(),
                    &mut len,
                    libc::SOCK_CLOEXEC,
                )
            };
            match cvt(rc) {
                Ok(fd) => break fd,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Accept(err)),
            }
        };
        // SAFETY: accept4 returned a new descriptor that we now own.
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        let peer = BdAddr(peer.rc_bdaddr);
        debug!(%peer, "accepted rfcomm connection");
        Ok(Link::from_rfcomm(
            RfcommStream::from_fd(fd),
            format!("bt://{peer}/{}", self.addr.channel),
        ))
    }

    pub(crate) fn label(&self) -> String {
        format!("bt://{}", self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bdaddr_is_stored_reversed() {
        let addr: BdAddr = "84:9f:b5:85:c1:91".parse().unwrap();
        assert_eq!(addr.0, [0x91, 0xc1, 0x85, 0xb5, 0x9f, 0x84]);
        assert_eq!(addr.to_string(), "84:9F:B5:85:C1:91");
    }

    #[test]
    fn any_maps_to_zero_address() {
        let addr = RfcommAddr::parse("any/3").unwrap();
        assert_eq!(addr.device, BdAddr::ANY);
        assert_eq!(addr.channel, 3);
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!("84:9f:b5:85:c1".parse::<BdAddr>().is_err());
        assert!("84:9f:b5:85:c1:91:00".parse::<BdAddr>().is_err());
        assert!(RfcommAddr::parse("84:9f:b5:85:c1:91").is_err());
    }

    #[test]
    fn sockaddr_layout_matches_bluez() {
        assert_eq!(std::mem::size_of::<SockaddrRc>(), 10);
    }
}
