#![no_main]

use libfuzzer_sys::fuzz_target;
use rft_transport::wire::{verify, Packet};

/// Fuzz the wire decode pipeline: decode must never panic on arbitrary
/// bytes, and a packet that fails `verify` must never be trusted even if
/// `decode` happens to succeed on it.
fuzz_target!(|data: &[u8]| {
    let _ = Packet::decode(data);
    let _ = verify(data);
});
