//! # Receiver Engine
//!
//! Pure logic — no socket or file I/O. The caller owns the datagram channel
//! and the output file; this engine owns packet admission, duplicate
//! suppression, in-order delivery ordering, and ACK/SACK generation.
//!
//! ## Responsibilities
//!
//! 1. **Admission**: accept DATA within `[base_seq_num, base_seq_num + W)`,
//!    discard (but still ACK) everything else.
//! 2. **Buffering**: out-of-order packets are held in a map keyed by
//!    sequence number until the gap below them closes.
//! 3. **Delivery**: drain the contiguous prefix starting at `base_seq_num`
//!    to the caller, in strict sequence-number order, exactly once each.
//! 4. **ACK/SACK generation**: summarise the contiguous-buffered-run
//!    boundary on every ACK so the sender can target retransmission without
//!    an explicit gap list.
//! 5. **Session lifecycle**: START admission (deriving the suggested
//!    filename), END teardown, re-ACKing duplicates of both.

use std::collections::HashMap;

use bytes::Bytes;

use crate::codec;
use crate::session::{Session, SessionState};
use crate::stats::ReceiverStats;
use crate::wire::{Packet, PacketHeader, PacketType};

/// Receiver configuration parameters.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Admissible receive window `W`: DATA packets with
    /// `seq_num >= base_seq_num + window` are treated as out-of-window.
    pub window: u32,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig { window: 64 }
    }
}

/// Outcome of feeding one received datagram to [`Receiver::on_datagram`].
#[derive(Debug, Default)]
pub struct ReceiveOutcome {
    /// Wire-ready ACK bytes to send back, if any (corrupt packets get none).
    pub ack: Option<Bytes>,
    /// Payload chunks newly delivered to the output file, in order.
    pub delivered: Vec<Bytes>,
    /// `Some(name)` the first time a START is processed; the caller should
    /// open its output file at the derived path.
    pub started: Option<String>,
    /// `true` once the session has closed (END acked).
    pub closed: bool,
}

/// Receiver state machine.
pub struct Receiver {
    config: ReceiverConfig,
    session: Session,
    base_seq_num: u32,
    last_contig_seq_num: u32,
    largest_seq_num: u32,
    buffer: HashMap<u32, Bytes>,
    stats: ReceiverStats,
}

impl Receiver {
    pub fn new(config: ReceiverConfig) -> Self {
        Receiver {
            config,
            session: Session::new(),
            base_seq_num: 0,
            last_contig_seq_num: 0,
            largest_seq_num: 0,
            buffer: HashMap::new(),
            stats: ReceiverStats::new(),
        }
    }

    /// Process one received datagram. Checksum failures are discarded with
    /// no ACK, letting the sender's RTO drive recovery.
    pub fn on_datagram(&mut self, bytes: &[u8]) -> ReceiveOutcome {
        let mut outcome = ReceiveOutcome::default();
        let packet = match codec::decode_verified(bytes) {
            Some(p) => p,
            None => {
                self.stats.corrupt_dropped += 1;
                tracing::debug!(bytes = bytes.len(), "dropped corrupt packet");
                return outcome;
            }
        };
        match packet.header.packet_type {
            PacketType::Start => self.handle_start(packet, &mut outcome),
            PacketType::Data => self.handle_data(packet, &mut outcome),
            PacketType::End => self.handle_end(packet, &mut outcome),
            PacketType::Ack => {}
        }
        outcome
    }

    fn handle_start(&mut self, packet: Packet, outcome: &mut ReceiveOutcome) {
        match self.session.state() {
            SessionState::Init => {
                let name = String::from_utf8_lossy(&packet.payload).into_owned();
                self.base_seq_num = packet.header.seq_num.wrapping_add(1);
                self.last_contig_seq_num = packet.header.seq_num;
                self.largest_seq_num = packet.header.seq_num;
                self.session.on_start();
                tracing::info!(seq = packet.header.seq_num, filename = %name, "session established");
                outcome.started = Some(name);
                outcome.ack = Some(self.make_ack(self.base_seq_num, self.base_seq_num));
                self.stats.acks_sent += 1;
            }
            SessionState::Established | SessionState::Closing => {
                // A retransmitted START means our earlier ACK was lost;
                // re-ACK without reopening the file.
                tracing::debug!("re-acking duplicate START");
                let (ack_num, sack_num) = self.recompute_ack_sack();
                outcome.ack = Some(self.make_ack(ack_num, sack_num));
                self.stats.acks_sent += 1;
            }
            SessionState::Closed => {}
        }
    }

    fn handle_data(&mut self, packet: Packet, outcome: &mut ReceiveOutcome) {
        if !self.session.accepts_data() {
            // DATA before START or after END: not meaningful, not ACKed.
            return;
        }
        let s = packet.header.seq_num;
        self.stats.packets_received += 1;

        let in_window = s >= self.base_seq_num && s < self.base_seq_num + self.config.window;
        if !in_window {
            if s < self.base_seq_num {
                self.stats.duplicates += 1;
                tracing::debug!(seq = s, base = self.base_seq_num, "duplicate of already-delivered packet");
            } else {
                self.stats.out_of_window += 1;
                tracing::debug!(seq = s, base = self.base_seq_num, "packet outside receive window");
            }
            let (ack_num, sack_num) = self.recompute_ack_sack();
            outcome.ack = Some(self.make_ack(ack_num, sack_num));
            self.stats.acks_sent += 1;
            return;
        }

        if self.buffer.contains_key(&s) {
            self.stats.duplicates += 1;
        } else {
            self.buffer.insert(s, packet.payload);
            self.largest_seq_num = self.largest_seq_num.max(s);
        }

        let (ack_num, sack_num) = self.recompute_ack_sack();
        outcome.ack = Some(self.make_ack(ack_num, sack_num));
        self.stats.acks_sent += 1;

        while let Some(payload) = self.buffer.remove(&self.base_seq_num) {
            self.stats.packets_delivered += 1;
            self.stats.bytes_delivered += payload.len() as u64;
            outcome.delivered.push(payload);
            self.base_seq_num += 1;
        }
    }

    fn handle_end(&mut self, packet: Packet, outcome: &mut ReceiveOutcome) {
        let end_ack = packet.header.seq_num.wrapping_add(1);
        match self.session.state() {
            SessionState::Established => {
                self.session.on_end();
                self.session.on_end_acked();
                tracing::info!(
                    packets_delivered = self.stats.packets_delivered,
                    bytes_delivered = self.stats.bytes_delivered,
                    "session closed"
                );
                outcome.ack = Some(self.make_ack(end_ack, end_ack));
                self.stats.acks_sent += 1;
                outcome.closed = true;
            }
            SessionState::Closing => {
                self.session.on_end_acked();
                outcome.ack = Some(self.make_ack(end_ack, end_ack));
                self.stats.acks_sent += 1;
                outcome.closed = true;
            }
            SessionState::Closed => {
                // Duplicate END: the sender's final ACK was lost. Re-ACK.
                tracing::debug!("re-acking duplicate END");
                outcome.ack = Some(self.make_ack(end_ack, end_ack));
                self.stats.acks_sent += 1;
            }
            SessionState::Init => {}
        }
    }

    /// Recompute (and update internal bookkeeping for) the `(ack_num,
    /// sack_num)` pair per the selective-ack policy. Safe to call at any
    /// time — it only extends `last_contig_seq_num` when the buffer
    /// actually supports it, and otherwise just reports current state.
    fn recompute_ack_sack(&mut self) -> (u32, u32) {
        let before = self.last_contig_seq_num;
        let mut x = self.last_contig_seq_num.wrapping_add(1);
        while x <= self.largest_seq_num && self.buffer.contains_key(&x) {
            self.last_contig_seq_num = x;
            x = x.wrapping_add(1);
        }
        let ack_num = self.last_contig_seq_num.wrapping_add(1);
        let advanced = self.last_contig_seq_num != before;

        let sack_num = if advanced {
            // The contiguous run grew: this is an append or a gap-fill that
            // closed the hole. Either way, no further hint is useful.
            ack_num
        } else {
            // The prefix is unchanged: look past the still-open hole for a
            // subsequent buffered run and report its far edge.
            let mut y = ack_num.wrapping_add(1);
            while y <= self.largest_seq_num && !self.buffer.contains_key(&y) {
                y = y.wrapping_add(1);
            }
            if y <= self.largest_seq_num {
                let mut end = y;
                while end <= self.largest_seq_num && self.buffer.contains_key(&end) {
                    end = end.wrapping_add(1);
                }
                end
            } else {
                ack_num
            }
        };
        (ack_num, sack_num)
    }

    fn make_ack(&self, ack_num: u32, sack_num: u32) -> Bytes {
        let mut header = PacketHeader::new(PacketType::Ack, 0, 0);
        header.ack_num = ack_num;
        header.sack_num = sack_num;
        Packet::new(header, Bytes::new()).encode()
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    /// Next sequence number the receiver will deliver. Non-decreasing.
    pub fn base_seq_num(&self) -> u32 {
        self.base_seq_num
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_bytes(name: &str, seq: u32) -> Bytes {
        let header = PacketHeader::new(PacketType::Start, seq, name.len() as u16);
        Packet::new(header, Bytes::copy_from_slice(name.as_bytes())).encode()
    }

    fn data_bytes(seq: u32, payload: &[u8]) -> Bytes {
        let header = PacketHeader::new(PacketType::Data, seq, payload.len() as u16);
        Packet::new(header, Bytes::copy_from_slice(payload)).encode()
    }

    fn end_bytes(seq: u32) -> Bytes {
        let header = PacketHeader::new(PacketType::End, seq, 0);
        Packet::new(header, Bytes::new()).encode()
    }

    fn ack_fields(wire: &Bytes) -> (u32, u32) {
        let decoded = Packet::decode(wire).unwrap();
        (decoded.header.ack_num, decoded.header.sack_num)
    }

    #[test]
    fn start_opens_session_and_acks_seq_plus_one() {
        let mut rx = Receiver::new(ReceiverConfig::default());
        let outcome = rx.on_datagram(&start_bytes("file.bin", 0));
        assert_eq!(outcome.started.as_deref(), Some("file.bin"));
        assert_eq!(ack_fields(outcome.ack.as_ref().unwrap()), (1, 1));
        assert_eq!(rx.base_seq_num(), 1);
    }

    #[test]
    fn duplicate_start_reacked_without_reopening() {
        let mut rx = Receiver::new(ReceiverConfig::default());
        rx.on_datagram(&start_bytes("file.bin", 0));
        let outcome = rx.on_datagram(&start_bytes("file.bin", 0));
        assert!(outcome.started.is_none());
        assert_eq!(ack_fields(outcome.ack.as_ref().unwrap()), (1, 1));
    }

    #[test]
    fn in_order_data_delivers_immediately() {
        let mut rx = Receiver::new(ReceiverConfig::default());
        rx.on_datagram(&start_bytes("file.bin", 0));
        let outcome = rx.on_datagram(&data_bytes(1, b"hello"));
        assert_eq!(outcome.delivered, vec![Bytes::from_static(b"hello")]);
        assert_eq!(ack_fields(outcome.ack.as_ref().unwrap()), (2, 2));
        assert_eq!(rx.base_seq_num(), 2);
    }

    #[test]
    fn out_of_order_arrival_buffers_and_reports_sack() {
        let mut rx = Receiver::new(ReceiverConfig::default());
        rx.on_datagram(&start_bytes("file.bin", 0));
        // seq 1 is the next expected; deliver seq 2 first.
        let outcome = rx.on_datagram(&data_bytes(2, b"beta"));
        assert!(outcome.delivered.is_empty());
        assert_eq!(ack_fields(outcome.ack.as_ref().unwrap()), (1, 3));

        let outcome2 = rx.on_datagram(&data_bytes(1, b"alpha"));
        assert_eq!(
            outcome2.delivered,
            vec![Bytes::from_static(b"alpha"), Bytes::from_static(b"beta")]
        );
        assert_eq!(rx.base_seq_num(), 3);
    }

    #[test]
    fn burst_loss_with_gap_reports_hole_boundary() {
        let mut rx = Receiver::new(ReceiverConfig::default());
        rx.on_datagram(&start_bytes("file.bin", 0));
        // Sequence numbers 1..=4 expected; 2 is missing so far.
        rx.on_datagram(&data_bytes(1, b"a"));
        let outcome = rx.on_datagram(&data_bytes(3, b"c"));
        // seq 3 is buffered as a one-packet run above the still-open hole at
        // 2; sack reports one past that run's last element.
        assert_eq!(ack_fields(outcome.ack.as_ref().unwrap()), (2, 4));

        let outcome2 = rx.on_datagram(&data_bytes(4, b"d"));
        // Still missing 2; the buffered run [3,4] is reported as a hint.
        assert_eq!(ack_fields(outcome2.ack.as_ref().unwrap()), (2, 5));

        let outcome3 = rx.on_datagram(&data_bytes(2, b"b"));
        assert_eq!(
            outcome3.delivered,
            vec![
                Bytes::from_static(b"b"),
                Bytes::from_static(b"c"),
                Bytes::from_static(b"d")
            ]
        );
        assert_eq!(rx.base_seq_num(), 5);
    }

    #[test]
    fn duplicate_already_delivered_packet_is_reacked() {
        let mut rx = Receiver::new(ReceiverConfig::default());
        rx.on_datagram(&start_bytes("file.bin", 0));
        rx.on_datagram(&data_bytes(1, b"hello"));
        let outcome = rx.on_datagram(&data_bytes(1, b"hello"));
        assert!(outcome.delivered.is_empty());
        assert_eq!(ack_fields(outcome.ack.as_ref().unwrap()), (2, 2));
        assert_eq!(rx.stats().duplicates, 1);
    }

    #[test]
    fn out_of_window_packet_discarded_but_still_acked() {
        let mut rx = Receiver::new(ReceiverConfig { window: 4 });
        rx.on_datagram(&start_bytes("file.bin", 0));
        let outcome = rx.on_datagram(&data_bytes(10, b"late"));
        assert!(outcome.delivered.is_empty());
        assert!(outcome.ack.is_some());
        assert_eq!(rx.stats().out_of_window, 1);
    }

    #[test]
    fn corrupt_packet_dropped_with_no_ack() {
        let mut rx = Receiver::new(ReceiverConfig::default());
        rx.on_datagram(&start_bytes("file.bin", 0));
        let mut wire = data_bytes(1, b"hello").to_vec();
        wire[0] ^= 0xFF;
        let outcome = rx.on_datagram(&wire);
        assert!(outcome.ack.is_none());
        assert!(outcome.delivered.is_empty());
        assert_eq!(rx.stats().corrupt_dropped, 1);
    }

    #[test]
    fn data_before_start_is_ignored() {
        let mut rx = Receiver::new(ReceiverConfig::default());
        let outcome = rx.on_datagram(&data_bytes(0, b"too early"));
        assert!(outcome.ack.is_none());
        assert!(outcome.delivered.is_empty());
    }

    #[test]
    fn end_closes_session_and_acks_seq_plus_one() {
        let mut rx = Receiver::new(ReceiverConfig::default());
        rx.on_datagram(&start_bytes("file.bin", 0));
        rx.on_datagram(&data_bytes(1, b"hi"));
        let outcome = rx.on_datagram(&end_bytes(2));
        assert!(outcome.closed);
        assert_eq!(ack_fields(outcome.ack.as_ref().unwrap()), (3, 3));
        assert!(rx.is_closed());
    }

    #[test]
    fn duplicate_end_is_reacked() {
        let mut rx = Receiver::new(ReceiverConfig::default());
        rx.on_datagram(&start_bytes("file.bin", 0));
        rx.on_datagram(&end_bytes(1));
        let outcome = rx.on_datagram(&end_bytes(1));
        assert_eq!(ack_fields(outcome.ack.as_ref().unwrap()), (2, 2));
        assert!(rx.is_closed());
    }

    #[test]
    fn data_after_end_is_ignored() {
        let mut rx = Receiver::new(ReceiverConfig::default());
        rx.on_datagram(&start_bytes("file.bin", 0));
        rx.on_datagram(&end_bytes(1));
        let outcome = rx.on_datagram(&data_bytes(5, b"late"));
        assert!(outcome.ack.is_none());
        assert!(outcome.delivered.is_empty());
    }
}
