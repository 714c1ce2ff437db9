use std::io::Cursor;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::utils::Seq16;

use super::{crc, DecodingError, EncodingError};

pub const HDR_LEN: usize = 4;
pub const TRAILER_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum PacketKind {
    Ack = 1,
    Nack = 2,
    Data = 3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    kind: PacketKind,
    seq: Seq16,
    payload: Vec<u8>,
}

impl Packet {
    #[must_use]
    pub fn ack(seq: Seq16) -> Self {
        Packet {
            kind: PacketKind::Ack,
            seq,
            payload: Vec::new(),
        }
    }

    #[must_use]
    pub fn nack(seq: Seq16) -> Self {
        Packet {
            kind: PacketKind::Nack,
            seq,
            payload: Vec::new(),
        }
    }

    #[must_use]
    pub fn data(seq: Seq16, payload: Vec<u8>) -> Self {
        Packet {
            kind: PacketKind::Data,
            seq,
            payload,
        }
    }

    #[must_use]
    #[inline]
    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    #[must_use]
    #[inline]
    pub fn seq(&self) -> Seq16 {
        self.seq
    }

    #[must_use]
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Fields of a fixed-size frame plus the outcome of its checksum.
///
/// `kind` stays raw: a frame that fails its checksum may carry any value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub kind: u16,
    pub seq: Seq16,
    pub payload: Vec<u8>,
    pub residue: u16,
}

impl Decoded {
    #[must_use]
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.residue == 0
    }

    pub fn into_packet(self) -> Result<Packet, DecodingError> {
        if !self.is_valid() {
            return Err(DecodingError::Checksum {
                residue: self.residue,
            });
        }
        let kind = PacketKind::try_from(self.kind)
            .map_err(|_e| DecodingError::Kind { kind: self.kind })?;
        let payload = match kind {
            PacketKind::Data => self.payload,
            PacketKind::Ack | PacketKind::Nack => Vec::new(),
        };
        Ok(Packet {
            kind,
            seq: self.seq,
            payload,
        })
    }
}

/// Encodes and decodes frames carrying exactly `payload_len` payload bytes.
#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    payload_len: usize,
}

impl PacketCodec {
    #[must_use]
    pub fn new(payload_len: usize) -> Self {
        assert!(payload_len > 0);
        PacketCodec { payload_len }
    }

    #[must_use]
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    #[must_use]
    #[inline]
    pub fn packet_len(&self) -> usize {
        HDR_LEN + self.payload_len + TRAILER_LEN
    }

    pub fn encode(&self, packet: &Packet) -> Result<Vec<u8>, EncodingError> {
        if packet.payload.len() > self.payload_len {
            return Err(EncodingError::PayloadTooLong {
                len: packet.payload.len(),
                max: self.payload_len,
            });
        }
        let mut buf = Vec::with_capacity(self.packet_len());
        buf.write_u16::<LittleEndian>(packet.kind.into()).unwrap();
        buf.write_u16::<LittleEndian>(packet.seq.to_u16()).unwrap();
        assert_eq!(buf.len(), HDR_LEN);
        buf.extend_from_slice(&packet.payload);
        buf.resize(HDR_LEN + self.payload_len + TRAILER_LEN, 0);

        let code = crc::checksum(&buf);
        buf.truncate(HDR_LEN + self.payload_len);
        buf.write_u16::<BigEndian>(code).unwrap();
        assert_eq!(buf.len(), self.packet_len());
        Ok(buf)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodingError> {
        if bytes.len() != self.packet_len() {
            return Err(DecodingError::Length {
                expected: self.packet_len(),
                actual: bytes.len(),
            });
        }
        let mut rdr = Cursor::new(bytes);
        // length is checked above
        let kind = rdr.read_u16::<LittleEndian>().unwrap();
        let seq = Seq16::from_u16(rdr.read_u16::<LittleEndian>().unwrap());
        let payload = bytes[HDR_LEN..HDR_LEN + self.payload_len].to_vec();
        let residue = crc::checksum(bytes);
        Ok(Decoded {
            kind,
            seq,
            payload,
            residue,
        })
    }
}
