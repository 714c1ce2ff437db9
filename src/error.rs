//! Connection-level errors.
//!
//! Packet-level failures (bad length, bad checksum, unknown type) never show
//! up here: the receive side drops such packets and counts them.

use std::io;

use thiserror::Error;

use crate::{protocol::EncodingError, utils::Seq16};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The byte transport failed to read or write.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// A read returned fewer bytes than the transport reported available.
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// The retransmission budget ran out without acknowledgment progress.
    #[error("protocol stall at seq {seq} after {retransmissions} retransmissions")]
    ProtocolStall { seq: Seq16, retransmissions: u32 },

    #[error("message needs {chunks} packets but one send takes at most {max}")]
    MessageTooLong { chunks: usize, max: usize },

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

impl Error {
    /// A recoverable error aborts the current receive attempt only.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::ShortRead { .. })
    }

    #[must_use]
    pub fn is_stall(&self) -> bool {
        matches!(self, Error::ProtocolStall { .. })
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Transport(e) => e,
            Error::ShortRead { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, e),
            Error::ProtocolStall { .. } => io::Error::new(io::ErrorKind::TimedOut, e),
            Error::MessageTooLong { .. } => io::Error::new(io::ErrorKind::InvalidInput, e),
            Error::Encoding(_) => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}
