//! Multicast socket lifecycle (§4.2): a sending socket bound to a chosen
//! local interface, and a receiving socket joined to the status group on
//! the same interface.
//!
//! Only IPv4 is supported; IPv6 is reserved for a later revision.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use radiod_common::Error;
use socket2::{Domain, Protocol, Socket, Type};

pub const STATUS_PORT: u16 = 5006;
pub const DEFAULT_TTL: u32 = 2;
pub const RECV_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// The sending half: a connected UDP socket bound to the caller's chosen
/// interface (or the OS default), targeting `(status_addr, 5006)`.
pub struct SendSocket {
    inner: UdpSocket,
}

impl SendSocket {
    pub fn new(
        status_addr: Ipv4Addr,
        interface: Option<Ipv4Addr>,
        multicast_loop: bool,
        ttl: u32,
    ) -> radiod_common::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(Error::Connection)?;

        socket.set_reuse_address(true).map_err(Error::Connection)?;
        socket
            .set_multicast_loop_v4(multicast_loop)
            .map_err(Error::Connection)?;
        socket.set_multicast_ttl_v4(ttl).map_err(Error::Connection)?;

        let bind_interface = interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
        socket
            .set_multicast_if_v4(&bind_interface)
            .map_err(Error::Connection)?;
        socket
            .bind(&SocketAddrV4::new(bind_interface, 0).into())
            .map_err(Error::Connection)?;

        let target = SocketAddr::V4(SocketAddrV4::new(status_addr, STATUS_PORT));
        socket.connect(&target.into()).map_err(Error::Connection)?;

        Ok(Self {
            inner: socket.into(),
        })
    }

    /// Sends a single already-encoded command buffer as one datagram.
    pub fn send(&self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.send(buf)
    }

    /// Re-targets the socket at a test-chosen port instead of the
    /// well-known status port, so tests don't need to bind privileged or
    /// potentially-in-use ports.
    #[cfg(any(test, feature = "test-util"))]
    pub fn send_to_test_port(&self, group: Ipv4Addr, port: u16) -> std::io::Result<()> {
        self.inner.connect(SocketAddrV4::new(group, port))
    }
}

/// The receiving half: a socket bound to all interfaces on the status
/// port, joined to the multicast group on the caller's chosen interface.
pub struct RecvSocket {
    inner: UdpSocket,
}

impl RecvSocket {
    pub fn new(status_addr: Ipv4Addr, interface: Option<Ipv4Addr>) -> radiod_common::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(Error::Connection)?;

        socket.set_reuse_address(true).map_err(Error::Connection)?;
        #[cfg(unix)]
        socket.set_reuse_port(true).map_err(Error::Connection)?;

        socket
            .bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, STATUS_PORT).into())
            .map_err(Error::Connection)?;

        let bind_interface = interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
        socket
            .join_multicast_v4(&status_addr, &bind_interface)
            .map_err(Error::Connection)?;

        socket
            .set_read_timeout(Some(RECV_READ_TIMEOUT))
            .map_err(Error::Connection)?;

        Ok(Self {
            inner: socket.into(),
        })
    }

    /// Creates a standalone status-listener socket bound to an ephemeral
    /// status port, for use by passive discovery and tests where binding
    /// to the well-known port would conflict with a running controller.
    #[cfg(any(test, feature = "test-util"))]
    pub fn new_on_port(
        status_addr: Ipv4Addr,
        interface: Option<Ipv4Addr>,
        port: u16,
    ) -> radiod_common::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(Error::Connection)?;

        socket.set_reuse_address(true).map_err(Error::Connection)?;
        socket
            .bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port).into())
            .map_err(Error::Connection)?;

        let bind_interface = interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
        socket
            .join_multicast_v4(&status_addr, &bind_interface)
            .map_err(Error::Connection)?;

        socket
            .set_read_timeout(Some(RECV_READ_TIMEOUT))
            .map_err(Error::Connection)?;

        Ok(Self {
            inner: socket.into(),
        })
    }

    /// Blocking read with the socket's configured timeout. `Ok(None)`
    /// distinguishes a timeout (cooperative loop exit) from a read
    /// error.
    pub fn recv_with_deadline(
        &self,
        buf: &mut [u8],
        deadline: Duration,
    ) -> std::io::Result<Option<usize>> {
        self.inner.set_read_timeout(Some(deadline))?;

        match self.inner.recv(buf) {
            Ok(size) => Ok(Some(size)),
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A multicast group in the 239.0.0.0/8 administratively-scoped range,
    // on an unused port, to avoid colliding with a real radiod on the
    // test host.
    const TEST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 211, 19, 7);

    #[test]
    fn send_and_receive_loopback() {
        let recv = RecvSocket::new_on_port(TEST_GROUP, None, 54221).unwrap();
        let send = SendSocket::new(TEST_GROUP, None, true, DEFAULT_TTL).unwrap();

        // Re-point the sender at the test port rather than the well-known
        // status port, since the test doesn't own that port.
        send.inner
            .connect(SocketAddrV4::new(TEST_GROUP, 54221))
            .unwrap();

        send.send(b"hello").unwrap();

        let mut buf = [0u8; 64];
        let size = recv
            .recv_with_deadline(&mut buf, Duration::from_millis(500))
            .unwrap()
            .expect("expected a packet before the deadline");

        assert_eq!(&buf[..size], b"hello");
    }

    #[test]
    fn receive_times_out_without_data() {
        let recv = RecvSocket::new_on_port(TEST_GROUP, None, 54222).unwrap();
        let mut buf = [0u8; 64];
        let result = recv
            .recv_with_deadline(&mut buf, Duration::from_millis(50))
            .unwrap();
        assert!(result.is_none());
    }
}
