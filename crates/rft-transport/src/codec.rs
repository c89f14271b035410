//! Packet codec: the encode/decode/verify contract over the wire format.
//!
//! This module is a thin, explicit façade over [`crate::wire`] so that
//! callers depend on a stable `encode`/`decode`/`verify` surface without
//! reaching into wire-layout details. `decode` never verifies integrity on
//! its own; callers that consume untrusted bytes must call `verify` first,
//! matching the split between "format mismatch" and "integrity mismatch"
//! failure modes.

use bytes::Bytes;

use crate::wire::{self, Packet};

/// Encode a packet into its wire representation, including checksum.
pub fn encode(packet: &Packet) -> Bytes {
    packet.encode()
}

/// Decode a wire image into a packet without checking its checksum.
pub fn decode(buf: &[u8]) -> Option<Packet> {
    Packet::decode(buf)
}

/// Check a wire image's checksum without fully decoding it.
pub fn verify(buf: &[u8]) -> bool {
    wire::verify(buf)
}

/// Decode and verify in one step; `None` on either a format or integrity
/// failure, matching how callers in `sender`/`receiver` treat both as
/// "discard the datagram".
pub fn decode_verified(buf: &[u8]) -> Option<Packet> {
    if !verify(buf) {
        return None;
    }
    Packet::decode(buf)
}
