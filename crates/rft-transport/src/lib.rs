//! # rft-transport
//!
//! Core engine for a reliable, ordered, single-file transfer protocol over an
//! unreliable datagram substrate: packet framing and integrity, sliding-window
//! ARQ with selective acknowledgement, adaptive RTO estimation, optional AIMD
//! congestion control, and the START/DATA/END session lifecycle.
//!
//! This crate is pure protocol logic: no socket creation, no file I/O, no
//! address resolution. [`sender::Sender`] consumes bytes handed to it by a
//! caller-owned `Read` and emits wire-ready [`bytes::Bytes`] to dispatch;
//! [`receiver::Receiver`] consumes wire-ready bytes and emits payload chunks
//! for the caller to append to its own output file. The binaries in
//! `rft-cli` supply the sockets, files, and the event loop that drives both.
//!
//! ## Crate structure
//!
//! - [`wire`] — packet header layout, checksum, encode/decode
//! - [`codec`] — encode/decode/verify façade over [`wire`]
//! - [`arq`] — RTO estimation (Karn's rule) and duplicate-ACK tracking
//! - [`congestion`] — AIMD congestion control (slow start / avoidance / fast recovery)
//! - [`session`] — INIT/ESTABLISHED/CLOSING/CLOSED state machine
//! - [`stats`] — aggregate sender/receiver counters
//! - [`sender`] — sender engine: transmit scheduling, ACK/SACK processing, retransmission
//! - [`receiver`] — receiver engine: admission, duplicate suppression, in-order delivery
//! - [`error`] — shared error taxonomy

pub mod arq;
pub mod codec;
pub mod congestion;
pub mod error;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod stats;
pub mod wire;

pub use error::TransportError;
