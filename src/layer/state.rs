use crate::utils::Seq16;

/// Send-direction sequence state shared by the uploader, which assigns
/// sequence numbers, and the downloader, where the peer's Acks and Nacks
/// arrive.
///
/// ```text
///  last_acked  send_seq        send_end
///      │           │               │
///  ────┼───────────┼───────────────┼──────▶ seq space
///      │ in flight │ resend window │
/// ```
///
/// `send_seq` only moves below `send_end` after a rewind.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    send_seq: Seq16,
    send_end: Seq16, // exclusive
    last_acked: Seq16,
    pending_nack: Option<Seq16>,
}

impl ConnectionState {
    fn check_rep(&self) {
        let una = self.last_acked.add_usize(1);
        assert!(self.send_seq.sub(&una) <= self.send_end.sub(&una));
    }

    #[must_use]
    pub fn new(initial_seq: Seq16) -> Self {
        let this = ConnectionState {
            send_seq: initial_seq,
            send_end: initial_seq,
            last_acked: initial_seq.sub_usize(1),
            pending_nack: None,
        };
        this.check_rep();
        this
    }

    #[must_use]
    #[inline]
    pub fn send_seq(&self) -> Seq16 {
        self.send_seq
    }

    #[must_use]
    #[inline]
    pub fn last_acked(&self) -> Seq16 {
        self.last_acked
    }

    #[must_use]
    #[inline]
    pub fn pending_nack(&self) -> Option<Seq16> {
        self.pending_nack
    }

    #[must_use]
    #[inline]
    pub fn has_outstanding(&self) -> bool {
        self.last_acked.add_usize(1) != self.send_seq
    }

    /// Number of sequences written but not yet acknowledged.
    #[must_use]
    #[inline]
    fn in_flight(&self) -> usize {
        self.send_end.sub(&self.last_acked.add_usize(1))
    }

    /// Returns the sequence to put on the next Data packet and whether it was
    /// already written once.
    pub(crate) fn advance_send_seq(&mut self) -> (Seq16, bool) {
        let seq = self.send_seq;
        let is_retransmission = seq != self.send_end;
        self.send_seq.increment();
        if !is_retransmission {
            self.send_end = self.send_seq;
        }
        self.check_rep();
        (seq, is_retransmission)
    }

    /// Moves `send_seq` back to `seq`, which must be unacknowledged and
    /// already written (or the next new one).
    pub(crate) fn rewind_to(&mut self, seq: Seq16) {
        let una = self.last_acked.add_usize(1);
        assert!(seq.sub(&una) <= self.in_flight());
        self.send_seq = seq;
        self.check_rep();
    }

    /// Records a cumulative Ack. Stale acks and acks for sequences never
    /// written are ignored; returns whether `last_acked` moved.
    pub fn on_ack(&mut self, seq: Seq16) -> bool {
        let dist = seq.sub(&self.last_acked);
        if !(1 <= dist && dist <= self.in_flight()) {
            return false;
        }
        self.last_acked = seq;
        if self.send_seq.sub(&self.last_acked.add_usize(1)) > self.in_flight() {
            // the acknowledged range overtook a rewound send cursor
            self.send_seq = self.last_acked.add_usize(1);
        }
        self.check_rep();
        true
    }

    /// Records a Nack: the peer wants everything from `seq` again, which also
    /// proves it holds everything before `seq`.
    pub fn on_nack(&mut self, seq: Seq16) -> bool {
        self.pending_nack = Some(seq);
        self.on_ack(seq.sub_usize(1))
    }

    #[must_use]
    pub(crate) fn take_pending_nack(&mut self) -> Option<Seq16> {
        self.pending_nack.take()
    }

    /// How many of the `total` sequences starting at `start` are acknowledged.
    #[must_use]
    pub fn acked_since(&self, start: Seq16, total: usize) -> usize {
        let acked = self.last_acked.add_usize(1).sub(&start);
        if acked <= total {
            acked
        } else {
            // `last_acked` is behind `start`
            0
        }
    }
}
