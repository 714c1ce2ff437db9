mod connection;
mod downloader;
mod state;
mod uploader;

use std::time::Duration;

pub use connection::*;
pub use downloader::{DataOutcome, Downloader, DownloaderBuilder, Received};
pub use state::*;
pub use uploader::{Uploader, UploaderBuilder, MAX_CHUNKS_PER_SEND};

pub mod stat {
    pub use super::downloader::Stat as DownloadStat;
    pub use super::uploader::Stat as UploadStat;
}

use crate::{protocol::PacketCodec, transport::ByteTransport, utils::Seq16};

/// Both ends of a link must agree on `payload_len` and `initial_seq`.
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    /// Payload bytes per packet (`D`).
    pub payload_len: usize,
    /// Slots in the reassembly ring (`B`); a power of two so that slot
    /// `seq mod B` stays contiguous across the sequence wrap.
    pub buf_slots: usize,
    pub initial_seq: u16,
    /// How long `send` waits without acknowledgment progress before it goes
    /// back to the first unacknowledged packet.
    pub retransmit_timeout: Duration,
    /// Consecutive timeouts tolerated before `send` gives up.
    pub max_retransmissions: u32,
    /// Recover frame alignment after lost or injected bytes.
    pub resync: bool,
}

impl ConnectionBuilder {
    pub fn build<T>(self, transport: T) -> Result<Connection<T>, BuildError>
    where
        T: ByteTransport,
    {
        self.check()?;
        let codec = PacketCodec::new(self.payload_len);
        let initial_seq = Seq16::from_u16(self.initial_seq);
        let uploader = UploaderBuilder {
            codec,
            retransmit_timeout: self.retransmit_timeout,
            max_retransmissions: self.max_retransmissions,
        }
        .build();
        let downloader = DownloaderBuilder {
            codec,
            buf_slots: self.buf_slots,
            initial_seq,
            resync: self.resync,
        }
        .build();
        Ok(Connection::new(
            transport,
            ConnectionState::new(initial_seq),
            uploader,
            downloader,
        ))
    }

    fn check(&self) -> Result<(), BuildError> {
        if self.payload_len == 0 || self.payload_len > u16::MAX as usize {
            return Err(BuildError::PayloadLen(self.payload_len));
        }
        if !self.buf_slots.is_power_of_two() || self.buf_slots > 1 << 16 {
            return Err(BuildError::BufSlots(self.buf_slots));
        }
        if self.retransmit_timeout.is_zero() {
            return Err(BuildError::RetransmitTimeout);
        }
        Ok(())
    }
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        ConnectionBuilder {
            payload_len: 8,
            buf_slots: 16,
            initial_seq: 0,
            retransmit_timeout: Duration::from_millis(500),
            max_retransmissions: 8,
            resync: true,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("payload length {0} out of range")]
    PayloadLen(usize),
    #[error("buffer slots {0} is not a power of two up to 65536")]
    BufSlots(usize),
    #[error("retransmit timeout must be non-zero")]
    RetransmitTimeout,
}
