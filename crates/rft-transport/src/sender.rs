//! # Sender Engine
//!
//! Pure logic — no socket or file I/O. The caller owns the readable file and
//! the datagram channel; this engine owns sequence-number assignment, the
//! in-flight window, ACK/SACK interpretation, RTO-driven and SACK-bounded
//! retransmission, and the START → DATA → END session lifecycle.
//!
//! ## Responsibilities
//!
//! 1. **Transmit scheduling**: read up to `MAX_PAYLOAD` bytes at a time from
//!    the caller's file while the window has room, assign sequence numbers,
//!    and hand back wire-ready bytes to send.
//! 2. **Window**: a contiguous ring of in-flight packets `[base_seq_num,
//!    next_seq_num)`, indexed by `seq_num - base_seq_num`, so retransmission
//!    never re-reads the file.
//! 3. **ACK/SACK processing**: cumulative-ACK progress, duplicate-ACK fast
//!    retransmit, and a SACK-bounded hint for which in-flight sequence
//!    numbers still need a timeout scan.
//! 4. **RTO estimation**: Karn's-rule-respecting RTT sampling feeding
//!    [`crate::arq::RtoEstimator`].
//! 5. **Congestion control**: optional AIMD window shaping via
//!    [`crate::congestion::CongestionController`].
//! 6. **Session lifecycle**: START admission gating, EOF detection, END
//!    teardown.

use std::collections::VecDeque;
use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use quanta::Instant;

use crate::arq::{DupAckOutcome, DupAckTracker, RtoEstimator};
use crate::codec;
use crate::congestion::CongestionController;
use crate::session::{Session, SessionState};
use crate::stats::SenderStats;
use crate::wire::{Packet, PacketHeader, PacketType, MAX_PAYLOAD};

/// Sender configuration parameters (protocol constants exposed as tunables).
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Static effective window when congestion control is disabled.
    pub window: u32,
    /// Whether AIMD congestion control shapes the effective window (§4.5).
    pub congestion_control: bool,
    /// Consecutive RTO expirations with no cumulative-ACK progress before
    /// the session fails with `PeerUnreachable`.
    pub max_consecutive_timeouts: u32,
    /// Receive-deadline hint for the datagram adapter; not used by this
    /// engine directly, carried here so `rft-cli` has a single source of
    /// truth for the poll interval.
    pub recv_poll_interval: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        SenderConfig {
            window: 16,
            congestion_control: true,
            max_consecutive_timeouts: 10,
            recv_poll_interval: Duration::from_millis(100),
        }
    }
}

/// One in-flight packet. Owns its encoded payload so retransmission never
/// re-reads the file.
#[derive(Debug, Clone)]
struct WindowSlot {
    seq_num: u32,
    packet_type: PacketType,
    payload: Bytes,
    last_send: Instant,
    retrans: bool,
}

/// Outcome of feeding one received datagram to [`Sender::on_datagram`].
#[derive(Debug, Default)]
pub struct AckOutcome {
    /// Wire-ready bytes to (re)send immediately, e.g. a fast retransmit.
    pub retransmits: Vec<Bytes>,
    /// `true` once the session has fully closed (END acked).
    pub closed: bool,
}

/// Sender state machine.
pub struct Sender {
    config: SenderConfig,
    session: Session,
    window: VecDeque<WindowSlot>,
    base_seq_num: u32,
    next_seq_num: u32,
    end_seq_num: Option<u32>,
    eof: bool,
    rto: RtoEstimator,
    dup_ack: DupAckTracker,
    congestion: CongestionController,
    /// Exclusive upper bound of the receiver's last-reported contiguous
    /// buffered run, used to bound the timeout retransmit scan (§4.2).
    sack_hint: Option<u32>,
    consecutive_timeouts: u32,
    failed: bool,
    stats: SenderStats,
}

impl Sender {
    /// Create a new sender. Sequence numbers start at 0 (START consumes it).
    pub fn new(config: SenderConfig) -> Self {
        let congestion = if config.congestion_control {
            CongestionController::new()
        } else {
            CongestionController::disabled(config.window as f64)
        };
        Sender {
            config,
            session: Session::new(),
            window: VecDeque::new(),
            base_seq_num: 0,
            next_seq_num: 0,
            end_seq_num: None,
            eof: false,
            rto: RtoEstimator::new(),
            dup_ack: DupAckTracker::new(),
            congestion,
            sack_hint: None,
            consecutive_timeouts: 0,
            failed: false,
            stats: SenderStats::new(),
        }
    }

    /// Send the initial START packet, carrying `filename` as its payload so
    /// the receiver knows what to call the file it writes. Must be called
    /// exactly once before [`Sender::fill_window`] admits any DATA.
    pub fn begin(&mut self, filename: &str, now: Instant) -> Bytes {
        let seq = self.next_seq_num;
        let payload = Bytes::copy_from_slice(filename.as_bytes());
        let header = PacketHeader::new(PacketType::Start, seq, payload.len() as u16);
        let wire = Packet::new(header, payload.clone()).encode();
        self.window.push_back(WindowSlot {
            seq_num: seq,
            packet_type: PacketType::Start,
            payload,
            last_send: now,
            retrans: false,
        });
        self.next_seq_num += 1;
        self.stats.packets_sent += 1;
        wire
    }

    /// Read from `reader` and admit new DATA packets while the window has
    /// room, EOF has not been reached, and the session is established.
    /// Returns wire-ready bytes to send, in order.
    pub fn fill_window(
        &mut self,
        reader: &mut impl Read,
        now: Instant,
    ) -> std::io::Result<Vec<Bytes>> {
        let mut out = Vec::new();
        if self.eof || !self.session.is_established() {
            return Ok(out);
        }
        while self.window_has_room() {
            let mut buf = vec![0u8; MAX_PAYLOAD];
            let n = reader.read(&mut buf)?;
            if n == 0 {
                self.eof = true;
                break;
            }
            buf.truncate(n);
            let payload = Bytes::from(buf);
            let seq = self.next_seq_num;
            let header = PacketHeader::new(PacketType::Data, seq, n as u16);
            let wire = Packet::new(header, payload.clone()).encode();
            self.window.push_back(WindowSlot {
                seq_num: seq,
                packet_type: PacketType::Data,
                payload,
                last_send: now,
                retrans: false,
            });
            self.next_seq_num += 1;
            self.stats.packets_sent += 1;
            self.stats.bytes_sent += n as u64;
            out.push(wire);
        }
        Ok(out)
    }

    fn window_has_room(&self) -> bool {
        let effective = self.effective_window();
        self.next_seq_num - self.base_seq_num < effective
    }

    fn effective_window(&self) -> u32 {
        self.congestion.effective_window().floor().max(1.0) as u32
    }

    /// Process one received datagram (expected to be an ACK; anything else
    /// is ignored). Corrupt datagrams are silently dropped.
    pub fn on_datagram(&mut self, bytes: &[u8], now: Instant) -> AckOutcome {
        let mut outcome = AckOutcome::default();
        let packet = match codec::decode_verified(bytes) {
            Some(p) => p,
            None => {
                self.stats.corrupt_acks_dropped += 1;
                tracing::debug!(bytes = bytes.len(), "dropped corrupt ACK");
                return outcome;
            }
        };
        if packet.header.packet_type != PacketType::Ack {
            return outcome;
        }
        let ack_num = packet.header.ack_num;
        self.sack_hint = Some(packet.header.sack_num);

        if ack_num > self.base_seq_num {
            self.advance_base(ack_num, now);
            self.dup_ack.reset(ack_num);
            self.consecutive_timeouts = 0;
            if self.session.state() == SessionState::Init {
                self.session.on_start();
            }
        } else if ack_num == self.base_seq_num && !self.window.is_empty() {
            if let DupAckOutcome::FastRetransmit = self.dup_ack.observe(ack_num) {
                tracing::debug!(seq = self.base_seq_num, "fast retransmit on triple duplicate ACK");
                if let Some(wire) = self.retransmit_slot_at(self.base_seq_num, now) {
                    outcome.retransmits.push(wire);
                }
                self.congestion.on_triple_dup_ack();
            }
        }

        if self.session.state() == SessionState::Closing {
            if let Some(end_seq) = self.end_seq_num {
                if ack_num > end_seq {
                    self.session.on_end_acked();
                    outcome.closed = true;
                    tracing::info!(
                        packets_sent = self.stats.packets_sent,
                        retransmissions = self.stats.retransmissions,
                        "session closed"
                    );
                }
            }
        }
        self.stats.last_rtt_us = self.rto.srtt_micros().unwrap_or(0.0) as u64;
        outcome
    }

    /// Release window slots in `[base_seq_num, ack_num)`, sampling RTT from
    /// any slot that was never retransmitted (Karn's rule).
    fn advance_base(&mut self, ack_num: u32, now: Instant) {
        while self.base_seq_num < ack_num {
            if let Some(slot) = self.window.pop_front() {
                if !slot.retrans {
                    let rtt = now.duration_since(slot.last_send);
                    self.rto.sample(rtt.as_micros() as f64);
                }
                self.stats.packets_acked += 1;
            }
            self.base_seq_num += 1;
        }
        self.congestion.on_new_ack();
    }

    /// Retransmit the window slot at `seq`, marking it as a retransmission
    /// (excludes it from future RTT sampling) and restamping its send time.
    fn retransmit_slot_at(&mut self, seq: u32, now: Instant) -> Option<Bytes> {
        if seq < self.base_seq_num {
            return None;
        }
        let idx = (seq - self.base_seq_num) as usize;
        let slot = self.window.get_mut(idx)?;
        slot.retrans = true;
        slot.last_send = now;
        let mut header = PacketHeader::new(slot.packet_type, slot.seq_num, slot.payload.len() as u16);
        header.retrans = 1;
        let wire = Packet::new(header, slot.payload.clone()).encode();
        self.stats.packets_sent += 1;
        self.stats.retransmissions += 1;
        Some(wire)
    }

    /// Scan in-flight slots for RTO expiry and retransmit the expired ones,
    /// bounded by the receiver's last-reported SACK hint (§4.2). A single
    /// pass with at least one expiry triggers RTO backoff and, if enabled,
    /// congestion-control collapse.
    pub fn check_timeouts(&mut self, now: Instant) -> Vec<Bytes> {
        let rto = Duration::from_micros(self.rto.rto_micros().round() as u64);
        // The slot at base_seq_num is always a retransmission candidate —
        // it is by definition the receiver's cumulative ack point, i.e. the
        // next thing it is missing. sack_num only extends the bound past it
        // when the receiver has reported a buffered run beyond the hole;
        // when it carries no extra information (sack_num == ack_num) the
        // scan still covers the one slot the cumulative ACK names.
        let scan_end = self
            .sack_hint
            .map(|s| s.max(self.base_seq_num + 1))
            .unwrap_or(self.next_seq_num)
            .min(self.next_seq_num);

        let mut resent = Vec::new();
        let mut any_expired = false;
        for seq in self.base_seq_num..scan_end {
            let idx = (seq - self.base_seq_num) as usize;
            let expired = self
                .window
                .get(idx)
                .map(|slot| now.duration_since(slot.last_send) >= rto)
                .unwrap_or(false);
            if expired {
                any_expired = true;
                if let Some(wire) = self.retransmit_slot_at(seq, now) {
                    resent.push(wire);
                }
            }
        }
        if any_expired {
            self.rto.backoff();
            self.congestion.on_rto();
            self.consecutive_timeouts += 1;
            tracing::debug!(
                consecutive_timeouts = self.consecutive_timeouts,
                rto_micros = self.rto.rto_micros(),
                resent = resent.len(),
                "retransmission timeout"
            );
            if self.consecutive_timeouts >= self.config.max_consecutive_timeouts {
                self.failed = true;
                tracing::warn!(
                    base_seq_num = self.base_seq_num,
                    "peer unreachable after repeated retransmission timeouts"
                );
            }
        }
        resent
    }

    /// Once EOF has been reached and every DATA packet is acked, send END
    /// and enter CLOSING. A no-op if already sent or preconditions unmet.
    pub fn try_close(&mut self, now: Instant) -> Option<Bytes> {
        if !self.eof
            || self.base_seq_num != self.next_seq_num
            || !self.session.is_established()
            || self.end_seq_num.is_some()
        {
            return None;
        }
        let seq = self.next_seq_num;
        self.end_seq_num = Some(seq);
        let header = PacketHeader::new(PacketType::End, seq, 0);
        let wire = Packet::new(header, Bytes::new()).encode();
        self.window.push_back(WindowSlot {
            seq_num: seq,
            packet_type: PacketType::End,
            payload: Bytes::new(),
            last_send: now,
            retrans: false,
        });
        self.next_seq_num += 1;
        self.session.on_end();
        self.stats.packets_sent += 1;
        Some(wire)
    }

    /// `true` once the END packet has been acked and the session is closed.
    pub fn is_done(&self) -> bool {
        self.session.is_closed()
    }

    /// `true` once the consecutive-timeout bound has been exceeded with no
    /// progress; the caller should surface `TransportError::PeerUnreachable`.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    /// Current cumulative-ACK point. Monotone non-decreasing (§8 invariant 1).
    pub fn base_seq_num(&self) -> u32 {
        self.base_seq_num
    }

    pub fn next_seq_num(&self) -> u32 {
        self.next_seq_num
    }

    /// Current retransmission timeout estimate, in microseconds.
    pub fn rto_micros(&self) -> f64 {
        self.rto.rto_micros()
    }
}
