//! Integration tests: `Sender` and `Receiver` wired together through the
//! encoded wire format, with no socket in the loop. "The network" is just a
//! `Vec<Bytes>` passed between the two engines, with impairment (loss,
//! reorder, corruption) applied by the test itself.

use std::time::Duration;

use bytes::Bytes;
use quanta::Instant;
use rft_transport::receiver::{Receiver, ReceiverConfig};
use rft_transport::sender::{Sender, SenderConfig};

fn test_sender() -> Sender {
    Sender::new(SenderConfig {
        window: 8,
        congestion_control: false,
        max_consecutive_timeouts: 10,
        recv_poll_interval: Duration::from_millis(10),
    })
}

fn test_receiver() -> Receiver {
    Receiver::new(ReceiverConfig { window: 8 })
}

/// Drive a full transfer over a lossless, in-order, uncorrupted channel and
/// return the bytes the receiver delivered.
fn clean_transfer(payload: &[u8]) -> Vec<u8> {
    let mut tx = test_sender();
    let mut rx = test_receiver();
    let t0 = Instant::now();

    let start = tx.begin("file.bin", t0);
    let outcome = rx.on_datagram(&start);
    let mut delivered = Vec::new();
    tx.on_datagram(outcome.ack.as_ref().unwrap(), t0);

    let mut cursor: &[u8] = payload;
    loop {
        let sent = tx.fill_window(&mut cursor, t0).unwrap();
        if sent.is_empty() {
            break;
        }
        for wire in sent {
            let out = rx.on_datagram(&wire);
            delivered.extend(out.delivered.iter().flat_map(|b| b.to_vec()));
            if let Some(ack) = out.ack {
                tx.on_datagram(&ack, t0);
            }
        }
    }

    if let Some(end) = tx.try_close(t0) {
        let out = rx.on_datagram(&end);
        if let Some(ack) = out.ack {
            tx.on_datagram(&ack, t0);
        }
    }

    assert!(tx.is_done());
    assert!(rx.is_closed());
    delivered
}

#[test]
fn clean_channel_transfers_file_unmodified() {
    let payload = b"the quick brown fox jumps over the lazy dog".repeat(50);
    let delivered = clean_transfer(&payload);
    assert_eq!(delivered, payload);
}

#[test]
fn single_packet_loss_is_retransmitted_via_rto() {
    let mut tx = test_sender();
    let mut rx = test_receiver();
    let t0 = Instant::now();

    let start = tx.begin("file.bin", t0);
    let ack = rx.on_datagram(&start).ack.unwrap();
    tx.on_datagram(&ack, t0);

    let mut cursor: &[u8] = b"AAAAAAAAAABBBBBBBBBBCCCCCCCCCC";
    let sent = tx.fill_window(&mut cursor, t0).unwrap();
    assert_eq!(sent.len(), 1, "payload fits in a single datagram here");

    // Drop the one in-flight DATA packet entirely; nothing reaches the
    // receiver, so no ACK comes back and the sender must time out.
    let rto = Duration::from_micros(tx.rto_micros());
    let t1 = t0 + rto + Duration::from_millis(1);
    let resent = tx.check_timeouts(t1);
    assert_eq!(resent.len(), 1);
    assert_eq!(tx.stats().retransmissions, 1);

    let outcome = rx.on_datagram(&resent[0]);
    assert_eq!(outcome.delivered, vec![Bytes::from_static(b"AAAAAAAAAABBBBBBBBBBCCCCCCCCCC")]);
    tx.on_datagram(outcome.ack.as_ref().unwrap(), t1);
    assert_eq!(tx.base_seq_num(), tx.next_seq_num());
}

#[test]
fn burst_loss_with_gap_recovers_via_sack_bounded_retransmit() {
    let mut tx = test_sender();
    let mut rx = test_receiver();
    let t0 = Instant::now();

    let start = tx.begin("file.bin", t0);
    let ack = rx.on_datagram(&start).ack.unwrap();
    tx.on_datagram(&ack, t0);

    // Four packets, one payload byte each so they don't coalesce.
    let mut cursor: &[u8] = b"wxyz";
    let sent = tx.fill_window(&mut cursor, t0).unwrap();
    assert_eq!(sent.len(), 4);

    // Packet 2 (seq 2) is lost; 1, 3, 4 (seq 1, 3, 4) arrive.
    let ack1 = rx.on_datagram(&sent[0]).ack.unwrap();
    tx.on_datagram(&ack1, t0);
    let ack3 = rx.on_datagram(&sent[2]).ack.unwrap();
    tx.on_datagram(&ack3, t0);
    let ack4 = rx.on_datagram(&sent[3]).ack.unwrap();
    tx.on_datagram(&ack4, t0);

    // The sender's timeout scan should be bounded to cover at least seq 2,
    // the actual hole, thanks to the SACK hint reporting the buffered run.
    let rto = Duration::from_micros(tx.rto_micros());
    let t1 = t0 + rto + Duration::from_millis(1);
    let resent = tx.check_timeouts(t1);
    assert!(resent.iter().any(|w| {
        rft_transport::wire::Packet::decode(w).unwrap().header.seq_num == 2
    }));

    for wire in &resent {
        let outcome = rx.on_datagram(wire);
        if let Some(ack) = outcome.ack {
            tx.on_datagram(&ack, t1);
        }
    }
    assert_eq!(rx.base_seq_num(), 5);
}

#[test]
fn corrupt_ack_does_not_advance_sender_base() {
    let mut tx = test_sender();
    let mut rx = test_receiver();
    let t0 = Instant::now();
    let start = tx.begin("file.bin", t0);
    let ack = rx.on_datagram(&start).ack.unwrap();

    let mut corrupt_ack = ack.to_vec();
    corrupt_ack[0] ^= 0xFF;
    let before = tx.base_seq_num();
    tx.on_datagram(&corrupt_ack, t0);
    assert_eq!(tx.base_seq_num(), before);
    assert_eq!(tx.stats().corrupt_acks_dropped, 1);
}

#[test]
fn out_of_order_arrival_still_delivers_in_sequence() {
    let mut rx = test_receiver();
    let start = {
        let header = rft_transport::wire::PacketHeader::new(
            rft_transport::wire::PacketType::Start,
            0,
            "f".len() as u16,
        );
        rft_transport::wire::Packet::new(header, Bytes::from_static(b"f")).encode()
    };
    rx.on_datagram(&start);

    fn data(seq: u32, payload: &[u8]) -> Bytes {
        let header = rft_transport::wire::PacketHeader::new(
            rft_transport::wire::PacketType::Data,
            seq,
            payload.len() as u16,
        );
        rft_transport::wire::Packet::new(header, Bytes::copy_from_slice(payload)).encode()
    }

    // seq 3 and 2 arrive before seq 1.
    let o3 = rx.on_datagram(&data(3, b"d"));
    assert!(o3.delivered.is_empty());
    let o2 = rx.on_datagram(&data(2, b"c"));
    assert!(o2.delivered.is_empty());
    let o1 = rx.on_datagram(&data(1, b"b"));
    assert_eq!(
        o1.delivered,
        vec![
            Bytes::from_static(b"b"),
            Bytes::from_static(b"c"),
            Bytes::from_static(b"d"),
        ]
    );
    assert_eq!(rx.base_seq_num(), 4);
}

#[test]
fn lost_final_ack_is_recovered_by_duplicate_end_re_ack() {
    let mut tx = test_sender();
    let mut rx = test_receiver();
    let t0 = Instant::now();

    let start = tx.begin("file.bin", t0);
    let ack = rx.on_datagram(&start).ack.unwrap();
    tx.on_datagram(&ack, t0);

    let mut cursor: &[u8] = b"done";
    let sent = tx.fill_window(&mut cursor, t0).unwrap();
    let data_ack = rx.on_datagram(&sent[0]).ack.unwrap();
    tx.on_datagram(&data_ack, t0);
    tx.fill_window(&mut cursor, t0).unwrap(); // observe EOF

    let end = tx.try_close(t0).unwrap();
    let end_ack = rx.on_datagram(&end).ack.unwrap();
    assert!(rx.is_closed());

    // The sender never saw `end_ack` (simulated loss); it retransmits END
    // on timeout, and the receiver — already closed — must re-ACK it.
    assert!(!tx.is_done());
    let rto = Duration::from_micros(tx.rto_micros());
    let t1 = t0 + rto + Duration::from_millis(1);
    let resent = tx.check_timeouts(t1);
    assert_eq!(resent.len(), 1);

    let replay_ack = rx.on_datagram(&resent[0]).ack.unwrap();
    let outcome = tx.on_datagram(&replay_ack, t1);
    assert!(outcome.closed);
    assert!(tx.is_done());
    let _ = end_ack;
}
