//! Adaptive retransmission timing: RFC 6298-style RTO estimation with
//! Karn's rule, and duplicate-ACK tracking for fast retransmit.

/// Minimum retransmission timeout, in microseconds (200ms).
pub const RTO_MIN_MICROS: f64 = 200_000.0;
/// Maximum retransmission timeout, in microseconds (60s).
pub const RTO_MAX_MICROS: f64 = 60_000_000.0;
/// RTO used before any RTT sample has been taken.
const INITIAL_RTO_MICROS: f64 = 1_000_000.0;

const ALPHA: f64 = 0.125;
const BETA: f64 = 0.25;

/// Smoothed RTT / RTO estimator. Microsecond-valued throughout, resolving
/// the mixed-unit ambiguity of the original reference implementation.
#[derive(Debug, Clone)]
pub struct RtoEstimator {
    srtt: Option<f64>,
    rttvar: f64,
    rto: f64,
}

impl Default for RtoEstimator {
    fn default() -> Self {
        RtoEstimator {
            srtt: None,
            rttvar: 0.0,
            rto: INITIAL_RTO_MICROS,
        }
    }
}

impl RtoEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an RTT sample, in microseconds, from a packet that was never
    /// retransmitted. Samples from retransmitted packets must be excluded
    /// by the caller (Karn's rule) before calling this.
    pub fn sample(&mut self, rtt_micros: f64) {
        match self.srtt {
            None => {
                self.srtt = Some(rtt_micros);
                self.rttvar = rtt_micros / 2.0;
            }
            Some(srtt) => {
                self.rttvar = (1.0 - BETA) * self.rttvar + BETA * (srtt - rtt_micros).abs();
                self.srtt = Some((1.0 - ALPHA) * srtt + ALPHA * rtt_micros);
            }
        }
        let srtt = self.srtt.unwrap();
        self.rto = (srtt + 4.0 * self.rttvar).clamp(RTO_MIN_MICROS, RTO_MAX_MICROS);
    }

    /// Current retransmission timeout, in microseconds.
    pub fn rto_micros(&self) -> f64 {
        self.rto
    }

    /// Double the RTO on a bare timeout (exponential backoff), clamped to
    /// `RTO_MAX_MICROS`.
    pub fn backoff(&mut self) {
        self.rto = (self.rto * 2.0).min(RTO_MAX_MICROS);
    }

    pub fn srtt_micros(&self) -> Option<f64> {
        self.srtt
    }
}

/// Tracks consecutive duplicate cumulative ACKs for fast retransmit.
#[derive(Debug, Clone, Default)]
pub struct DupAckTracker {
    last_ack: Option<u32>,
    count: u32,
}

/// Outcome of feeding an ACK number through a [`DupAckTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DupAckOutcome {
    /// `ack_num` advanced past the last known cumulative ACK.
    NewProgress,
    /// `ack_num` repeated the last cumulative ACK, but fewer than 3 times so far.
    Duplicate,
    /// The third consecutive duplicate: caller should fast-retransmit.
    FastRetransmit,
}

impl DupAckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a newly received cumulative `ack_num`.
    pub fn observe(&mut self, ack_num: u32) -> DupAckOutcome {
        match self.last_ack {
            Some(last) if ack_num == last => {
                self.count += 1;
                if self.count >= 3 {
                    self.count = 0;
                    DupAckOutcome::FastRetransmit
                } else {
                    DupAckOutcome::Duplicate
                }
            }
            _ => {
                self.last_ack = Some(ack_num);
                self.count = 0;
                DupAckOutcome::NewProgress
            }
        }
    }

    /// Seed the tracker with the cumulative ACK point just reached by new
    /// progress, so the very next repeat of `ack_num` is counted as
    /// duplicate #1 rather than mistaken for further progress.
    pub fn reset(&mut self, ack_num: u32) {
        self.last_ack = Some(ack_num);
        self.count = 0;
    }
}
