use std::{
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, trace, warn};

use crate::{
    error::{Error, Result},
    protocol::{Packet, PacketCodec},
    transport::ByteTransport,
    utils::Seq16,
};

use super::{ConnectionState, Downloader};

/// Largest number of packets one `send` may span. Keeps every sequence of a
/// call within half the sequence space, where wrapping comparisons hold.
pub const MAX_CHUNKS_PER_SEND: usize = (u16::MAX / 2) as usize;

/// Send side: chunks a message into Data packets and drives them to full
/// acknowledgment, going back to the first missing packet on Nack or on
/// retransmission timeout.
pub struct Uploader {
    codec: PacketCodec,
    retransmit_timeout: Duration,
    max_retransmissions: u32,
    stat: LocalStat,
}

pub struct UploaderBuilder {
    pub codec: PacketCodec,
    pub retransmit_timeout: Duration,
    pub max_retransmissions: u32,
}

impl UploaderBuilder {
    #[must_use]
    pub fn build(self) -> Uploader {
        Uploader {
            codec: self.codec,
            retransmit_timeout: self.retransmit_timeout,
            max_retransmissions: self.max_retransmissions,
            stat: LocalStat::default(),
        }
    }
}

/// Progress bookkeeping for one `send` call.
#[derive(Default)]
struct Attempt {
    // chunks acknowledged when progress was last seen
    progress: usize,
    // timeouts since then
    retransmissions: u32,
    last_rewind: Option<usize>,
}

/// Where the wait for acknowledgments ended up.
enum Wait {
    Done,
    /// Transmit again from this chunk index.
    Resend(usize),
}

impl Uploader {
    /// Longest message a single `send` accepts.
    #[must_use]
    pub fn max_message_len(&self) -> usize {
        MAX_CHUNKS_PER_SEND * self.codec.payload_len()
    }

    #[must_use]
    pub fn stat(&self, state: &ConnectionState) -> Stat {
        Stat {
            pushes: self.stat.pushes,
            retransmissions: self.stat.retransmissions,
            nack_rewinds: self.stat.nack_rewinds,
            rto_hits: self.stat.rto_hits,
            short_reads: self.stat.short_reads,
            stalls: self.stat.stalls,
            next_seq_to_send: state.send_seq(),
            last_acked: state.last_acked(),
        }
    }

    /// Sends `message` and returns once the peer acknowledged every packet of
    /// it. A short last chunk is zero-padded on the wire.
    pub fn send<T>(
        &mut self,
        message: &[u8],
        state: &mut ConnectionState,
        downloader: &mut Downloader,
        transport: &mut T,
    ) -> Result<()>
    where
        T: ByteTransport + ?Sized,
    {
        let chunks: Vec<&[u8]> = message.chunks(self.codec.payload_len()).collect();
        let total = chunks.len();
        if total == 0 {
            return Ok(());
        }
        if total > MAX_CHUNKS_PER_SEND {
            return Err(Error::MessageTooLong {
                chunks: total,
                max: MAX_CHUNKS_PER_SEND,
            });
        }

        // nothing was outstanding, so any nack on record is stale
        let _ = state.take_pending_nack();
        let start = state.send_seq();
        debug!(start = %start, total, len = message.len(), "send");

        let mut next = 0;
        let mut attempt = Attempt::default();
        loop {
            while next < total {
                next = usize::max(next, state.acked_since(start, total));
                if next == total {
                    break;
                }
                self.transmit(start, next, chunks[next], state, transport)?;
                next += 1;
                self.poll_once(state, downloader, transport)?;
            }

            match self.wait(start, total, state, downloader, transport, &mut attempt)? {
                Wait::Done => break,
                Wait::Resend(from) => {
                    state.rewind_to(start.add_usize(from));
                    next = from;
                }
            }
        }

        trace!(start = %start, total, "send acknowledged");
        Ok(())
    }

    fn transmit<T>(
        &mut self,
        start: Seq16,
        index: usize,
        chunk: &[u8],
        state: &mut ConnectionState,
        transport: &mut T,
    ) -> Result<()>
    where
        T: ByteTransport + ?Sized,
    {
        let (seq, is_retransmission) = state.advance_send_seq();
        assert_eq!(seq, start.add_usize(index));
        let bytes = self.codec.encode(&Packet::data(seq, chunk.to_vec()))?;
        transport.write(&bytes)?;
        self.stat.pushes += 1;
        if is_retransmission {
            self.stat.retransmissions += 1;
        }
        trace!(seq = %seq, is_retransmission, "data");
        Ok(())
    }

    /// Polls until every chunk is acknowledged or a resend is due.
    fn wait<T>(
        &mut self,
        start: Seq16,
        total: usize,
        state: &mut ConnectionState,
        downloader: &mut Downloader,
        transport: &mut T,
        attempt: &mut Attempt,
    ) -> Result<Wait>
    where
        T: ByteTransport + ?Sized,
    {
        let mut deadline = Instant::now() + self.retransmit_timeout;
        loop {
            while self.poll_once(state, downloader, transport)? {}

            let acked = state.acked_since(start, total);
            if acked == total {
                return Ok(Wait::Done);
            }
            if attempt.progress < acked {
                attempt.progress = acked;
                attempt.retransmissions = 0;
                attempt.last_rewind = None;
                deadline = Instant::now() + self.retransmit_timeout;
            }

            if let Some(nack) = state.take_pending_nack() {
                let from = nack.sub(&start);
                // a rewind already taken without progress is left to the timer
                if from == acked && attempt.last_rewind != Some(from) {
                    self.stat.nack_rewinds += 1;
                    debug!(nack = %nack, from, "go back on nack");
                    attempt.last_rewind = Some(from);
                    return Ok(Wait::Resend(from));
                }
                trace!(nack = %nack, "nack ignored");
            }

            if deadline <= Instant::now() {
                self.stat.rto_hits += 1;
                let seq = start.add_usize(acked);
                let retransmissions = attempt.retransmissions;
                if retransmissions >= self.max_retransmissions {
                    self.stat.stalls += 1;
                    warn!(seq = %seq, retransmissions, "protocol stall");
                    return Err(Error::ProtocolStall {
                        seq,
                        retransmissions,
                    });
                }
                attempt.retransmissions += 1;
                debug!(seq = %seq, retransmissions = attempt.retransmissions, "retransmission timeout");
                attempt.last_rewind = Some(acked);
                return Ok(Wait::Resend(acked));
            }

            thread::yield_now();
        }
    }

    /// One receive step. Short reads only abort the step.
    fn poll_once<T>(
        &mut self,
        state: &mut ConnectionState,
        downloader: &mut Downloader,
        transport: &mut T,
    ) -> Result<bool>
    where
        T: ByteTransport + ?Sized,
    {
        match downloader.try_receive_one(state, transport) {
            Ok(x) => Ok(x.is_some()),
            Err(e) if e.is_recoverable() => {
                self.stat.short_reads += 1;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Default)]
struct LocalStat {
    pushes: u64,
    retransmissions: u64,
    nack_rewinds: u64,
    rto_hits: u64,
    short_reads: u64,
    stalls: u64,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Stat {
    pub pushes: u64,
    pub retransmissions: u64,
    pub nack_rewinds: u64,
    pub rto_hits: u64,
    pub short_reads: u64,
    pub stalls: u64,
    pub next_seq_to_send: Seq16,
    pub last_acked: Seq16,
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, io};

    use crate::{layer::DownloaderBuilder, protocol::PacketKind};

    use super::*;

    const D: usize = 8;

    /// A receiver that answers every Data packet the moment it is written.
    struct Peer {
        codec: PacketCodec,
        inbound: VecDeque<u8>,
        sent: Vec<Packet>,
        expected: Seq16,
        silent: bool,
        // seqs whose next Data packet is lost
        lose_data: Vec<u16>,
        // seqs whose next Ack is lost
        lose_ack: Vec<u16>,
    }

    impl Peer {
        fn new(initial_seq: Seq16) -> Self {
            Peer {
                codec: PacketCodec::new(D),
                inbound: VecDeque::new(),
                sent: Vec::new(),
                expected: initial_seq,
                silent: false,
                lose_data: Vec::new(),
                lose_ack: Vec::new(),
            }
        }

        fn sent_seqs(&self) -> Vec<u16> {
            self.sent.iter().map(|p| p.seq().to_u16()).collect()
        }

        fn reply(&mut self, packet: &Packet) {
            self.inbound.extend(self.codec.encode(packet).unwrap());
        }
    }

    fn take(list: &mut Vec<u16>, n: u16) -> bool {
        match list.iter().position(|&x| x == n) {
            Some(i) => {
                list.remove(i);
                true
            }
            None => false,
        }
    }

    impl ByteTransport for Peer {
        fn bytes_available(&mut self) -> io::Result<usize> {
            Ok(self.inbound.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = usize::min(buf.len(), self.inbound.len());
            for (dst, src) in buf.iter_mut().zip(self.inbound.drain(..n)) {
                *dst = src;
            }
            Ok(n)
        }

        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            let packet = self.codec.decode(bytes).unwrap().into_packet().unwrap();
            assert_eq!(packet.kind(), PacketKind::Data);
            let seq = packet.seq();
            self.sent.push(packet);
            if self.silent || take(&mut self.lose_data, seq.to_u16()) {
                return Ok(());
            }
            if seq == self.expected {
                self.expected.increment();
                if !take(&mut self.lose_ack, seq.to_u16()) {
                    self.reply(&Packet::ack(seq));
                }
            } else {
                let expected = self.expected;
                self.reply(&Packet::nack(expected));
            }
            Ok(())
        }
    }

    struct Sender {
        uploader: Uploader,
        state: ConnectionState,
        downloader: Downloader,
    }

    impl Sender {
        fn new(initial_seq: Seq16, retransmit_timeout: Duration, max_retransmissions: u32) -> Self {
            let codec = PacketCodec::new(D);
            Sender {
                uploader: UploaderBuilder {
                    codec,
                    retransmit_timeout,
                    max_retransmissions,
                }
                .build(),
                state: ConnectionState::new(initial_seq),
                downloader: DownloaderBuilder {
                    codec,
                    buf_slots: 4,
                    initial_seq,
                    resync: true,
                }
                .build(),
            }
        }

        fn send(&mut self, message: &[u8], peer: &mut Peer) -> Result<()> {
            self.uploader
                .send(message, &mut self.state, &mut self.downloader, peer)
        }

        fn stat(&self) -> Stat {
            self.uploader.stat(&self.state)
        }
    }

    fn seq(n: u16) -> Seq16 {
        Seq16::from_u16(n)
    }

    fn sender() -> Sender {
        Sender::new(seq(0), Duration::from_millis(5), 4)
    }

    #[test]
    fn test_chunks_and_pads() {
        let mut sender = sender();
        let mut peer = Peer::new(seq(0));
        sender.send(b"ABCDEFGHIJ", &mut peer).unwrap();

        assert_eq!(peer.sent_seqs(), vec![0, 1]);
        assert_eq!(peer.sent[0].payload(), b"ABCDEFGH");
        assert_eq!(peer.sent[1].payload(), b"IJ\0\0\0\0\0\0");
        let stat = sender.stat();
        assert_eq!(stat.pushes, 2);
        assert_eq!(stat.retransmissions, 0);
        assert_eq!(stat.next_seq_to_send, seq(2));
        assert_eq!(stat.last_acked, seq(1));
    }

    #[test]
    fn test_consecutive_sends() {
        let mut sender = sender();
        let mut peer = Peer::new(seq(0));
        sender.send(b"first", &mut peer).unwrap();
        sender.send(b"second..third", &mut peer).unwrap();
        assert_eq!(peer.sent_seqs(), vec![0, 1, 2]);
        assert!(!sender.state.has_outstanding());
    }

    #[test]
    fn test_empty_message() {
        let mut sender = sender();
        let mut peer = Peer::new(seq(0));
        sender.send(b"", &mut peer).unwrap();
        assert!(peer.sent.is_empty());
        assert_eq!(sender.state.send_seq(), seq(0));
    }

    #[test]
    fn test_message_too_long() {
        let mut sender = sender();
        let mut peer = Peer::new(seq(0));
        let message = vec![0; MAX_CHUNKS_PER_SEND * D + 1];
        let err = sender.send(&message, &mut peer).unwrap_err();
        assert!(matches!(
            err,
            Error::MessageTooLong {
                chunks,
                max: MAX_CHUNKS_PER_SEND,
            } if chunks == MAX_CHUNKS_PER_SEND + 1
        ));
        assert!(peer.sent.is_empty());
    }

    #[test]
    fn test_nack_goes_back() {
        let mut sender = sender();
        let mut peer = Peer::new(seq(0));
        peer.lose_data.push(2);
        let message: Vec<u8> = (0..5u8).flat_map(|n| [n; D]).collect();
        sender.send(&message, &mut peer).unwrap();

        assert_eq!(peer.sent_seqs(), vec![0, 1, 2, 3, 4, 2, 3, 4]);
        let stat = sender.stat();
        assert_eq!(stat.nack_rewinds, 1);
        assert_eq!(stat.retransmissions, 3);
        assert_eq!(stat.rto_hits, 0);
    }

    #[test]
    fn test_lost_ack_times_out() {
        let mut sender = sender();
        let mut peer = Peer::new(seq(0));
        peer.lose_ack.push(1);
        sender.send(b"0123456789abcdef", &mut peer).unwrap();

        // the duplicate is answered with Nack(2), which acknowledges 1
        assert_eq!(peer.sent_seqs(), vec![0, 1, 1]);
        let stat = sender.stat();
        assert_eq!(stat.rto_hits, 1);
        assert_eq!(stat.last_acked, seq(1));
    }

    #[test]
    fn test_wraparound() {
        let start = seq(u16::MAX - 1);
        let mut sender = Sender::new(start, Duration::from_millis(5), 4);
        let mut peer = Peer::new(start);
        sender.send(&[7; 4 * D], &mut peer).unwrap();
        assert_eq!(peer.sent_seqs(), vec![65534, 65535, 0, 1]);
        assert_eq!(sender.stat().last_acked, seq(1));
    }

    #[test]
    fn test_silent_peer_stalls() {
        let mut sender = Sender::new(seq(0), Duration::from_millis(5), 2);
        let mut peer = Peer::new(seq(0));
        peer.silent = true;
        let err = sender.send(b"x", &mut peer).unwrap_err();

        assert!(matches!(
            err,
            Error::ProtocolStall {
                seq: s,
                retransmissions: 2,
            } if s == seq(0)
        ));
        assert_eq!(peer.sent_seqs(), vec![0, 0, 0]);
        let stat = sender.stat();
        assert_eq!(stat.stalls, 1);
        assert_eq!(stat.rto_hits, 3);
    }

    #[test]
    fn test_progress_resets_budget() {
        // two timeouts with progress in between; a budget of one suffices
        let mut sender = Sender::new(seq(0), Duration::from_millis(5), 1);
        let mut peer = Peer::new(seq(0));
        peer.lose_data.extend([1, 2, 2]);
        sender.send(&[1; 3 * D], &mut peer).unwrap();

        assert_eq!(peer.sent_seqs(), vec![0, 1, 2, 1, 2, 2]);
        let stat = sender.stat();
        assert_eq!(stat.rto_hits, 2);
        assert_eq!(stat.stalls, 0);
        assert!(!sender.state.has_outstanding());
    }
}
