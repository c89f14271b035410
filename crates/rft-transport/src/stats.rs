//! Transport statistics: aggregate sender- and receiver-side counters,
//! suitable for JSON logging or a final transfer summary.

use serde::Serialize;

/// Aggregate sender-side statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SenderStats {
    /// Total packets sent, including retransmissions.
    pub packets_sent: u64,
    /// Total payload bytes sent (original data only, not counting resends).
    pub bytes_sent: u64,
    /// Packets acknowledged by the receiver.
    pub packets_acked: u64,
    /// Retransmissions triggered by RTO expiry or fast retransmit.
    pub retransmissions: u64,
    /// Corrupt ACKs discarded (checksum mismatch).
    pub corrupt_acks_dropped: u64,
    /// Last RTT sample used to update the RTO estimator, in microseconds.
    pub last_rtt_us: u64,
}

impl SenderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimated loss rate: unacked / sent.
    pub fn loss_rate(&self) -> f64 {
        if self.packets_sent == 0 {
            0.0
        } else {
            let unacked = self.packets_sent.saturating_sub(self.packets_acked);
            unacked as f64 / self.packets_sent as f64
        }
    }

    /// Retransmission overhead ratio.
    pub fn retransmit_ratio(&self) -> f64 {
        if self.packets_sent == 0 {
            0.0
        } else {
            self.retransmissions as f64 / self.packets_sent as f64
        }
    }
}

/// Aggregate receiver-side statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReceiverStats {
    /// Total DATA packets received, including duplicates and out-of-window.
    pub packets_received: u64,
    /// Payload bytes written to the output file.
    pub bytes_delivered: u64,
    /// Packets delivered to the output file (unique, in order).
    pub packets_delivered: u64,
    /// Duplicate packets (already delivered or already buffered).
    pub duplicates: u64,
    /// Packets discarded for falling outside the receive window.
    pub out_of_window: u64,
    /// Packets discarded for failing checksum verification.
    pub corrupt_dropped: u64,
    /// ACKs sent (including duplicate/re-ACKs).
    pub acks_sent: u64,
}

impl ReceiverStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective goodput: unique packets delivered vs. total received.
    pub fn goodput_ratio(&self) -> f64 {
        if self.packets_received == 0 {
            0.0
        } else {
            self.packets_delivered as f64 / self.packets_received as f64
        }
    }
}
