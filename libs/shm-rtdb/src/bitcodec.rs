//! Bit-packed I/O image codec
//!
//! Converts between raw process-image bytes and ordered coil values.
//! Bit 0 of each byte is the first coil of that byte (LSB-first), which is
//! also the packing used by Modbus coil payloads.

/// Ordered, fixed-length sequence of coil values
pub type BitVector = Vec<bool>;

/// Unpack bytes into bits, least-significant bit first.
///
/// The result always has `8 * bytes.len()` entries.
pub fn bytes_to_bits(bytes: &[u8]) -> BitVector {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for bit_index in 0..8 {
            bits.push((byte >> bit_index) & 1 == 1);
        }
    }
    bits
}

/// Pack bits into exactly `n_bytes` bytes, least-significant bit first.
///
/// Bits beyond `8 * n_bytes` are dropped; bytes past the last bit stay zero.
pub fn bits_to_bytes(bits: &[bool], n_bytes: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; n_bytes];
    for (i, &bit) in bits.iter().enumerate() {
        let byte_index = i / 8;
        if byte_index >= n_bytes {
            break;
        }
        if bit {
            bytes[byte_index] |= 1 << (i % 8);
        }
    }
    bytes
}

/// Number of bytes needed to hold `bit_count` bits
#[inline]
pub fn packed_len(bit_count: usize) -> usize {
    bit_count.div_ceil(8)
}

/// Render bits as `0`/`1` integers (change log columns)
pub fn bits_as_ints(bits: &[bool]) -> Vec<u8> {
    bits.iter().map(|&b| u8::from(b)).collect()
}
