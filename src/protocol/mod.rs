//! # Packet
//!
//! ```text
//! 0       2       4                       4+D     6+D (BYTE)
//! +-------+-------+-----------------------+-------+
//! | type  |  seq  |     payload (D)       |  crc  |
//! +-------+-------+-----------------------+-------+
//! ```
//!
//! - `type` and `seq` are little-endian; `type` is `1` (Ack), `2` (Nack) or
//!   `3` (Data)
//! - `crc` is big-endian, computed over the packet with the `crc` field zeroed
//!
//! # Invariants
//!
//! - every packet is exactly `6 + D` bytes long
//! - a Data payload shorter than `D` is zero-padded
//! - Ack and Nack carry `D` zero bytes as payload

pub mod crc;
pub mod packet;

pub use packet::*;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodingError {
    #[error("packet is {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },
    #[error("checksum residue {residue:#06x}")]
    Checksum { residue: u16 },
    #[error("unknown packet type {kind}")]
    Kind { kind: u16 },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("payload of {len} bytes does not fit in {max}")]
    PayloadTooLong { len: usize, max: usize },
}
