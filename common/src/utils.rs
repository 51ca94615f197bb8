//! Common Utilities
//!
//! Bit-level helpers used when serializing control information

use bytes::{BufMut, Bytes, BytesMut};

/// Append the `nof_bits` least significant bits of `value`, MSB first
pub fn append_bits(bits: &mut Vec<bool>, value: u32, nof_bits: u32) {
    assert!(nof_bits <= 32, "Cannot append {} bits from a u32", nof_bits);
    for i in (0..nof_bits).rev() {
        bits.push((value >> i) & 1 != 0);
    }
}

/// Pack bits into bytes (MSB first)
pub fn pack_bits(bits: &[bool]) -> Bytes {
    let mut bytes = BytesMut::with_capacity(bits.len().div_ceil(8));

    for chunk in bits.chunks(8) {
        let mut byte = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            if bit {
                byte |= 1 << (7 - i);
            }
        }
        bytes.put_u8(byte);
    }

    bytes.freeze()
}

/// Smallest `n` such that `2^n >= value`
pub fn ceil_log2(value: u32) -> u32 {
    if value <= 1 {
        return 0;
    }
    32 - (value - 1).leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_pack() {
        let mut bits = Vec::new();
        append_bits(&mut bits, 0b1010, 4);
        append_bits(&mut bits, 0b1010, 4);
        append_bits(&mut bits, 1, 1);
        let packed = pack_bits(&bits);
        assert_eq!(packed.len(), 2);
        assert_eq!(packed[0], 0xAA);
        assert_eq!(packed[1], 0x80);
    }

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(5), 3);
        assert_eq!(ceil_log2(1378), 11);
    }
}
