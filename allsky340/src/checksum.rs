/// Integrity byte appended to every outbound command frame.
///
/// Seeded with the inverted first byte, then each following byte is inverted
/// and XOR-ed in. The high bit is always cleared, so the result is in `0..=127`.
/// Callers must pass at least one byte; an empty slice yields `0`.
pub fn checksum(bytes: &[u8]) -> u8 {
    const MASK: u8 = 0x7F;
    match bytes.split_first() {
        Some((first, rest)) => rest
            .iter()
            .fold(!first & MASK, |acc, b| (acc ^ !b) & MASK),
        None => 0,
    }
}

/// Running XOR over a block payload, compared against the trailer byte the
/// camera sends after each image block.
pub fn lrc(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_checksum() {
        assert_eq!(checksum(b"E"), 0x3A);
        assert_eq!(checksum(b"X"), !b'X' & 0x7F);
    }

    #[test]
    fn multi_byte_checksum() {
        // ~'T' = 0xAB -> 0x2B; ~'e' = 0x9A -> 0x2B ^ 0x9A = 0xB1 -> 0x31
        assert_eq!(checksum(b"Te"), 0x31);
        assert_eq!(checksum(b"Test"), checksum(b"Test"));
    }

    #[test]
    fn checksum_is_seven_bit() {
        for a in 0..=u8::MAX {
            for b in [0x00, 0x7F, 0x80, 0xFF, a.wrapping_mul(31)] {
                assert!(checksum(&[a, b, a ^ b]) <= 0x7F);
            }
        }
    }

    #[test]
    fn lrc_of_block() {
        assert_eq!(lrc(&[]), 0);
        assert_eq!(lrc(&[0xAA, 0x55]), 0xFF);
        assert_eq!(lrc(&[0x12, 0x12]), 0);
    }
}
