//! CRC-16 with generator `0x2110`.
//!
//! The remainder register is fed message bits directly (no augmentation), most
//! significant bit first. A packet whose trailer is zeroed therefore yields
//! the checksum to store, and a packet carrying that checksum in its trailer
//! leaves a zero residue.

pub const POLY: u16 = 0x2110;

static TABLE: [u16; 256] = make_table(POLY);

const fn make_table(poly: u16) -> [u16; 256] {
    let mut table = [0; 256];
    let mut i = 0;
    while i < 256 {
        let mut r = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            let top = r & 0x8000 != 0;
            r <<= 1;
            if top {
                r ^= poly;
            }
            bit += 1;
        }
        table[i] = r;
        i += 1;
    }
    table
}

/// Table-driven form; identical output to [`checksum_bitwise`].
#[must_use]
pub fn checksum(message: &[u8]) -> u16 {
    let mut r: u16 = 0;
    for &byte in message {
        let top = (r >> 8) as usize;
        r = (r << 8) | byte as u16;
        r ^= TABLE[top];
    }
    r
}

/// Bit-serial reference form.
#[must_use]
pub fn checksum_bitwise(message: &[u8]) -> u16 {
    let mut r: u16 = 0;
    for &byte in message {
        for shift in (0..8).rev() {
            let do_xor = r & 0x8000 != 0;
            r = (r << 1) | ((byte >> shift) & 1) as u16;
            if do_xor {
                r ^= POLY;
            }
        }
    }
    r
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(checksum_bitwise(b"123456789"), 0xf3e9);
        assert_eq!(checksum(b"123456789"), 0xf3e9);
    }

    #[test]
    fn test_empty() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum_bitwise(&[]), 0);
    }

    #[test]
    fn test_table_matches_bitwise() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x2110);
        for _ in 0..1000 {
            let len = rng.gen_range(0..64);
            let message: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            assert_eq!(checksum(&message), checksum_bitwise(&message));
        }
    }

    #[test]
    fn test_zero_residue() {
        let mut message = b"hello there".to_vec();
        message.extend_from_slice(&[0, 0]);
        let code = checksum(&message);
        let len = message.len();
        message[len - 2..].copy_from_slice(&code.to_be_bytes());
        assert_eq!(checksum(&message), 0);
    }

    #[test]
    fn test_leading_zeros_ignored() {
        // no initial value: zero bytes in front do not move the register
        assert_eq!(checksum(&[0, 0, 0, 0xab, 0xcd]), checksum(&[0xab, 0xcd]));
    }
}
