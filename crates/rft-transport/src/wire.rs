//! Wire format: fixed-layout packet header, checksum, and packet framing.
//!
//! Every datagram on the wire is exactly one packet: an 18-byte header
//! (the "extended layout" — `seq_num`, `ack_num`, `sack_num`, `checksum`,
//! `length`, `retrans`, `type`, all big-endian) followed by up to
//! [`MAX_PAYLOAD`] bytes of payload. Both peers agree on this layout
//! statically; there is no negotiation.

use bytes::{Bytes, BytesMut};

/// Maximum payload bytes carried by a single packet.
pub const MAX_PAYLOAD: usize = 1024;

/// Size in bytes of [`PacketHeader`] on the wire.
pub const HEADER_SIZE: usize = 18;

const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;
const OFF_SACK: usize = 8;
const OFF_CHECKSUM: usize = 12;
const OFF_LENGTH: usize = 14;
const OFF_RETRANS: usize = 16;
const OFF_TYPE: usize = 17;

/// The four packet types exchanged over a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Data,
    Ack,
    Start,
    End,
}

impl PacketType {
    fn to_byte(self) -> u8 {
        match self {
            PacketType::Data => 0,
            PacketType::Ack => 1,
            PacketType::Start => 2,
            PacketType::End => 3,
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(PacketType::Data),
            1 => Some(PacketType::Ack),
            2 => Some(PacketType::Start),
            3 => Some(PacketType::End),
            _ => None,
        }
    }
}

/// Fixed-layout packet header. See module docs for byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub seq_num: u32,
    pub ack_num: u32,
    pub sack_num: u32,
    pub checksum: u16,
    pub length: u16,
    pub retrans: u8,
    pub packet_type: PacketType,
}

impl PacketHeader {
    pub fn new(packet_type: PacketType, seq_num: u32, length: u16) -> Self {
        PacketHeader {
            seq_num,
            ack_num: 0,
            sack_num: 0,
            checksum: 0,
            length,
            retrans: 0,
            packet_type,
        }
    }

    fn write_to(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.seq_num.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&self.ack_num.to_be_bytes());
        buf[OFF_SACK..OFF_SACK + 4].copy_from_slice(&self.sack_num.to_be_bytes());
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&self.checksum.to_be_bytes());
        buf[OFF_LENGTH..OFF_LENGTH + 2].copy_from_slice(&self.length.to_be_bytes());
        buf[OFF_RETRANS] = self.retrans;
        buf[OFF_TYPE] = self.packet_type.to_byte();
    }

    fn read_from(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        let seq_num = u32::from_be_bytes(buf[OFF_SEQ..OFF_SEQ + 4].try_into().ok()?);
        let ack_num = u32::from_be_bytes(buf[OFF_ACK..OFF_ACK + 4].try_into().ok()?);
        let sack_num = u32::from_be_bytes(buf[OFF_SACK..OFF_SACK + 4].try_into().ok()?);
        let checksum = u16::from_be_bytes(buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].try_into().ok()?);
        let length = u16::from_be_bytes(buf[OFF_LENGTH..OFF_LENGTH + 2].try_into().ok()?);
        let retrans = buf[OFF_RETRANS];
        let packet_type = PacketType::from_byte(buf[OFF_TYPE])?;
        Some(PacketHeader {
            seq_num,
            ack_num,
            sack_num,
            checksum,
            length,
            retrans,
            packet_type,
        })
    }
}

/// Header plus payload. The unit of wire transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(header: PacketHeader, payload: Bytes) -> Self {
        Packet { header, payload }
    }

    /// Encode into wire bytes, computing and filling in the checksum.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.resize(HEADER_SIZE, 0);
        self.header.write_to(&mut buf);
        buf.extend_from_slice(&self.payload);

        buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&[0, 0]);
        let checksum = compute_checksum(&buf);
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&checksum.to_be_bytes());

        buf.freeze()
    }

    /// Decode from wire bytes without verifying the checksum. Callers that
    /// need integrity verification should call [`verify`] first.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let header = PacketHeader::read_from(buf)?;
        let length = header.length as usize;
        if buf.len() < HEADER_SIZE + length {
            return None;
        }
        let payload = Bytes::copy_from_slice(&buf[HEADER_SIZE..HEADER_SIZE + length]);
        Some(Packet { header, payload })
    }
}

/// Internet-style one's-complement checksum over `data`, with the two
/// checksum-field bytes assumed to already be zeroed by the caller.
pub fn compute_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum += u16::from_be_bytes([word[0], word[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += u16::from_be_bytes([*last, 0]) as u32;
    }
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Verify a raw wire image: recompute the checksum with the stored checksum
/// field zeroed and compare against the value stored on the wire.
pub fn verify(buf: &[u8]) -> bool {
    if buf.len() < HEADER_SIZE {
        return false;
    }
    let stored = u16::from_be_bytes([buf[OFF_CHECKSUM], buf[OFF_CHECKSUM + 1]]);
    let mut scratch = buf.to_vec();
    scratch[OFF_CHECKSUM] = 0;
    scratch[OFF_CHECKSUM + 1] = 0;
    compute_checksum(&scratch) == stored
}
