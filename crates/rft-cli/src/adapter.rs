//! Thin datagram channel over [`std::net::UdpSocket`]: bind, a settable
//! receive deadline, and send/recv in terms of [`bytes::Bytes`]. This is the
//! entire "network" surface the transport core is kept ignorant of.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use rft_transport::wire::{HEADER_SIZE, MAX_PAYLOAD};

const RECV_BUF_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD;

/// A bound or unbound UDP socket, wrapped to speak in `Bytes` and tolerate
/// read-timeout elapses as a plain `None` rather than an error.
pub struct DatagramChannel {
    socket: UdpSocket,
}

impl DatagramChannel {
    /// Bind to a specific local address (the receiver's listening port).
    pub fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        Ok(DatagramChannel {
            socket: UdpSocket::bind(addr)?,
        })
    }

    /// Bind to an ephemeral local port (the sender's outbound socket).
    pub fn unbound() -> std::io::Result<Self> {
        Ok(DatagramChannel {
            socket: UdpSocket::bind(("0.0.0.0", 0))?,
        })
    }

    /// Set (or clear) the receive deadline. `None` blocks indefinitely.
    pub fn set_deadline(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }

    pub fn send_to(&self, bytes: &[u8], peer: SocketAddr) -> std::io::Result<()> {
        self.socket.send_to(bytes, peer)?;
        Ok(())
    }

    /// Block up to the current deadline for one datagram. A `None` result
    /// means the deadline elapsed with nothing received, not an error.
    pub fn recv(&self) -> std::io::Result<Option<(Bytes, SocketAddr)>> {
        let mut buf = BytesMut::zeroed(RECV_BUF_SIZE);
        match self.socket.recv_from(&mut buf) {
            Ok((n, peer)) => Ok(Some((buf.split_to(n).freeze(), peer))),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
