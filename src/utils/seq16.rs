use std::{cmp::Ordering, fmt, num::Wrapping};

/// A 16-bit sequence number in serial-number space.
///
/// Ordering wraps: `65535 < 0` holds because the two are one step apart.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Seq16 {
    n: u16,
}

impl Seq16 {
    #[must_use]
    pub const fn from_u16(n: u16) -> Self {
        Seq16 { n }
    }

    #[must_use]
    #[inline]
    pub fn to_u16(&self) -> u16 {
        self.n
    }

    #[must_use]
    pub fn add_usize(&self, n: usize) -> Self {
        let s = Wrapping(self.n) + Wrapping(n as u16);
        Seq16 { n: s.0 }
    }

    #[must_use]
    pub fn sub_usize(&self, n: usize) -> Self {
        let s = Wrapping(self.n) - Wrapping(n as u16);
        Seq16 { n: s.0 }
    }

    /// Forward distance from `other` to `self`.
    #[must_use]
    pub fn sub(&self, other: &Self) -> usize {
        let s = Wrapping(self.n) - Wrapping(other.n);
        s.0 as usize
    }

    pub fn increment(&mut self) {
        *self = self.add_usize(1);
    }

    #[must_use]
    pub fn max(lhs: Seq16, rhs: Seq16) -> Seq16 {
        if lhs < rhs {
            rhs
        } else {
            lhs
        }
    }
}

impl PartialOrd for Seq16 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Seq16 {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.n.cmp(&other.n) {
            Ordering::Less => {
                let diff = other.n - self.n;
                match diff <= u16::MAX / 2 {
                    true => Ordering::Less,
                    false => Ordering::Greater,
                }
            }
            Ordering::Equal => Ordering::Equal,
            Ordering::Greater => {
                let diff = self.n - other.n;
                match diff <= u16::MAX / 2 {
                    true => Ordering::Greater,
                    false => Ordering::Less,
                }
            }
        }
    }
}

impl fmt::Display for Seq16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.n)
    }
}
