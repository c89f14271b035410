//! Shared error taxonomy for the transport core and the binaries that drive it.
//!
//! One variant per abstract error kind named by the protocol design: two are
//! recoverable within the transport loop ([`TransportError::CorruptPacket`],
//! [`TransportError::OutOfWindow`]) and are normally handled by logging and
//! continuing rather than propagated; the rest are fatal to a session.

use std::io;

use thiserror::Error;

/// Errors surfaced by the transport core and the `recvfile`/`sendfile` binaries.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Malformed CLI invocation, out-of-range port, or unparseable address.
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// File or socket I/O failure (open, read, write, bind).
    #[error("local I/O error: {0}")]
    LocalIo(#[from] io::Error),

    /// Checksum mismatch on a decoded packet. Recoverable: the caller
    /// discards the packet and sends no ACK, letting the sender's RTO drive
    /// recovery.
    #[error("corrupt packet: checksum mismatch")]
    CorruptPacket,

    /// A DATA packet fell outside the receiver's admissible window.
    /// Recoverable: the caller discards the payload but still re-ACKs.
    #[error("packet outside receive window")]
    OutOfWindow,

    /// The retransmission retry bound was exceeded with no progress.
    #[error("peer unreachable after repeated retransmission timeouts")]
    PeerUnreachable,
}
