/// Fixed-capacity circular byte store made of equally sized slots.
///
/// Writes land one whole slot at a time at `write_cursor`; reads drain single
/// bytes from `read_cursor`. Nothing unread is ever overwritten: a slot write
/// into a full ring is refused.
pub struct RingBuf {
    buf: Vec<u8>,
    slot_len: usize,
    read_cursor: usize,
    write_cursor: usize,
    // unread bytes; disambiguates full from empty when the cursors meet
    len: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RingFull;

impl RingBuf {
    fn check_rep(&self) {
        assert!(self.len <= self.buf.len());
        assert_eq!(self.write_cursor % self.slot_len, 0);
        assert_eq!(
            (self.read_cursor + self.len) % self.buf.len(),
            self.write_cursor
        );
    }

    /// `first_slot` is where the first write lands.
    #[must_use]
    pub fn new(slots: usize, slot_len: usize, first_slot: usize) -> Self {
        assert!(slots > 0);
        assert!(slot_len > 0);
        let start = (first_slot % slots) * slot_len;
        let this = RingBuf {
            buf: vec![0; slots * slot_len],
            slot_len,
            read_cursor: start,
            write_cursor: start,
            len: 0,
        };
        this.check_rep();
        this
    }

    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    #[inline]
    pub fn slots(&self) -> usize {
        self.buf.len() / self.slot_len
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    #[inline]
    pub fn has_free_slot(&self) -> bool {
        self.slot_len <= self.buf.len() - self.len
    }

    #[must_use]
    #[inline]
    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    #[must_use]
    #[inline]
    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    /// Copies `data` into `slot`, which must be the slot under `write_cursor`.
    ///
    /// `data` shorter than a slot is zero-filled.
    pub fn push_slot(&mut self, slot: usize, data: &[u8]) -> Result<(), RingFull> {
        assert!(data.len() <= self.slot_len);
        assert_eq!((slot % self.slots()) * self.slot_len, self.write_cursor);
        if !self.has_free_slot() {
            return Err(RingFull);
        }
        let dst = &mut self.buf[self.write_cursor..self.write_cursor + self.slot_len];
        dst[..data.len()].copy_from_slice(data);
        dst[data.len()..].fill(0);
        self.write_cursor = (self.write_cursor + self.slot_len) % self.buf.len();
        self.len += self.slot_len;
        self.check_rep();
        Ok(())
    }

    #[must_use]
    pub fn pop_byte(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let byte = self.buf[self.read_cursor];
        self.read_cursor = (self.read_cursor + 1) % self.buf.len();
        self.len -= 1;
        self.check_rep();
        Some(byte)
    }

    /// Drains up to `out.len()` bytes; returns how many were copied.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let mut n = 0;
        while n < out.len() {
            match self.pop_byte() {
                Some(byte) => out[n] = byte,
                None => break,
            }
            n += 1;
        }
        n
    }
}
