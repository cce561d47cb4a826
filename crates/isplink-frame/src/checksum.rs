//! Byte-sum checksums.
//!
//! Frames carry their checksum in the final byte: the sum, modulo 256,
//! of every preceding byte. The same sum protects the address/size words
//! of an indirect package.

/// Sum of all bytes modulo 256.
pub fn byte_sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Verify an encoded frame whose last byte is its checksum.
///
/// Returns false for an empty buffer.
pub fn verify_frame(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((checksum, body)) => byte_sum(body) == *checksum,
        None => false,
    }
}
