use tracing::{debug, trace, warn};

use crate::{
    error::{Error, Result},
    protocol::{DecodingError, Packet, PacketCodec, PacketKind},
    transport::ByteTransport,
    utils::{RingBuf, RingFull, Seq16},
};

use super::ConnectionState;

/// Receive side: pulls one frame at a time off the transport, answers Data
/// with Ack or Nack and stages accepted payloads for the application.
pub struct Downloader {
    codec: PacketCodec,
    expected_seq: Seq16,
    ring: RingBuf,
    // bytes of the frame being assembled
    frame: Vec<u8>,
    resync: bool,
    stat: LocalStat,
}

pub struct DownloaderBuilder {
    pub codec: PacketCodec,
    pub buf_slots: usize,
    pub initial_seq: Seq16,
    pub resync: bool,
}

impl DownloaderBuilder {
    #[must_use]
    pub fn build(self) -> Downloader {
        assert!(self.buf_slots.is_power_of_two());
        assert!(self.buf_slots <= 1 << 16);
        let first_slot = self.initial_seq.to_u16() as usize % self.buf_slots;
        let this = Downloader {
            codec: self.codec,
            expected_seq: self.initial_seq,
            ring: RingBuf::new(self.buf_slots, self.codec.payload_len(), first_slot),
            frame: Vec::with_capacity(self.codec.packet_len()),
            resync: self.resync,
            stat: LocalStat::default(),
        };
        this.check_rep();
        this
    }
}

/// What one receive step did with the frame it read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Ack(Seq16),
    Nack(Seq16),
    Data { seq: Seq16, outcome: DataOutcome },
    /// Failed its checksum or carried an unknown type.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOutcome {
    /// Staged for the application and acknowledged.
    Accepted,
    /// Not the expected sequence; answered with a Nack.
    OutOfOrder,
    /// The expected sequence, but the ring has no free slot. Left
    /// unanswered so the peer retransmits it later.
    Refused,
}

impl Downloader {
    #[inline]
    fn check_rep(&self) {
        assert!(self.frame.len() < self.codec.packet_len());
    }

    #[must_use]
    pub fn stat(&self) -> Stat {
        Stat {
            packets: self.stat.packets,
            pushes: self.stat.pushes,
            accepted: self.stat.accepted,
            out_of_orders: self.stat.out_of_orders,
            refused: self.stat.refused,
            checksum_errors: self.stat.checksum_errors,
            format_errors: self.stat.format_errors,
            acks: self.stat.acks,
            nacks: self.stat.nacks,
            short_reads: self.stat.short_reads,
            next_seq_to_receive: self.expected_seq,
        }
    }

    #[must_use]
    #[inline]
    pub fn expected_seq(&self) -> Seq16 {
        self.expected_seq
    }

    #[must_use]
    #[inline]
    pub fn has_unread(&self) -> bool {
        !self.ring.is_empty()
    }

    #[must_use]
    #[inline]
    pub fn unread_len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn read_byte(&mut self) -> Option<u8> {
        self.ring.pop_byte()
    }

    pub fn read(&mut self, out: &mut [u8]) -> usize {
        self.ring.read(out)
    }

    /// Handles at most one inbound frame. `Ok(None)` means a whole frame is
    /// not available yet.
    pub fn try_receive_one<T>(
        &mut self,
        state: &mut ConnectionState,
        transport: &mut T,
    ) -> Result<Option<Received>>
    where
        T: ByteTransport + ?Sized,
    {
        let packet_len = self.codec.packet_len();
        let start = self.frame.len();
        let missing = packet_len - start;
        if transport.bytes_available()? < missing {
            return Ok(None);
        }

        self.frame.resize(packet_len, 0);
        let read = match transport.read(&mut self.frame[start..]) {
            Ok(x) => x,
            Err(e) => {
                self.frame.truncate(start);
                return Err(Error::Transport(e));
            }
        };
        if read < missing {
            self.stat.short_reads += 1;
            if self.resync {
                // keep what arrived; the rest completes the frame later
                self.frame.truncate(start + read);
                self.check_rep();
                trace!(read, missing, "partial frame");
                return Ok(None);
            }
            self.frame.clear();
            warn!(read, missing, "short read, frame dropped");
            return Err(Error::ShortRead {
                expected: missing,
                actual: read,
            });
        }

        let packet = self
            .codec
            .decode(&self.frame)
            .and_then(|decoded| decoded.into_packet());
        let packet = match packet {
            Ok(x) => {
                self.frame.clear();
                x
            }
            Err(e) => {
                self.discard_frame(&e);
                self.check_rep();
                return Ok(Some(Received::Discarded));
            }
        };
        self.stat.packets += 1;

        let seq = packet.seq();
        let received = match packet.kind() {
            PacketKind::Ack => {
                self.stat.acks += 1;
                let advanced = state.on_ack(seq);
                debug!(seq = %seq, advanced, "ack");
                Received::Ack(seq)
            }
            PacketKind::Nack => {
                self.stat.nacks += 1;
                let advanced = state.on_nack(seq);
                debug!(seq = %seq, advanced, "nack");
                Received::Nack(seq)
            }
            PacketKind::Data => {
                let outcome = self.handle_data(packet, transport)?;
                Received::Data { seq, outcome }
            }
        };
        self.check_rep();
        Ok(Some(received))
    }

    fn handle_data<T>(&mut self, packet: Packet, transport: &mut T) -> Result<DataOutcome>
    where
        T: ByteTransport + ?Sized,
    {
        self.stat.pushes += 1;
        let seq = packet.seq();
        let expected = self.expected_seq;
        if seq != expected {
            self.stat.out_of_orders += 1;
            debug!(seq = %seq, expected = %expected, "out of order, nack");
            self.write_packet(&Packet::nack(expected), transport)?;
            return Ok(DataOutcome::OutOfOrder);
        }

        let slot = seq.to_u16() as usize % self.ring.slots();
        match self.ring.push_slot(slot, packet.payload()) {
            Ok(()) => (),
            Err(RingFull) => {
                self.stat.refused += 1;
                let unread = self.ring.len();
                warn!(seq = %seq, unread, "reassembly buffer full, data refused");
                return Ok(DataOutcome::Refused);
            }
        }
        self.expected_seq.increment();
        self.stat.accepted += 1;
        trace!(seq = %seq, "data accepted");
        self.write_packet(&Packet::ack(seq), transport)?;
        Ok(DataOutcome::Accepted)
    }

    fn discard_frame(&mut self, e: &DecodingError) {
        match e {
            DecodingError::Checksum { .. } => self.stat.checksum_errors += 1,
            DecodingError::Length { .. } | DecodingError::Kind { .. } => {
                self.stat.format_errors += 1
            }
        }
        if self.resync {
            // slide the frame boundary by one byte
            self.frame.remove(0);
        } else {
            self.frame.clear();
        }
        trace!(error = %e, "frame discarded");
    }

    fn write_packet<T>(&self, packet: &Packet, transport: &mut T) -> Result<()>
    where
        T: ByteTransport + ?Sized,
    {
        let bytes = self.codec.encode(packet)?;
        transport.write(&bytes)?;
        Ok(())
    }
}

#[derive(Default)]
struct LocalStat {
    packets: u64,
    pushes: u64,
    accepted: u64,
    out_of_orders: u64,
    refused: u64,
    checksum_errors: u64,
    format_errors: u64,
    acks: u64,
    nacks: u64,
    short_reads: u64,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Stat {
    pub packets: u64,
    pub pushes: u64,
    pub accepted: u64,
    pub out_of_orders: u64,
    pub refused: u64,
    pub checksum_errors: u64,
    pub format_errors: u64,
    pub acks: u64,
    pub nacks: u64,
    pub short_reads: u64,
    pub next_seq_to_receive: Seq16,
}
