use bytes::{Buf, BufMut, BytesMut};

use crate::checksum::{byte_sum, verify_frame};
use crate::error::{FrameError, Result};

/// Total wire size of one frame, both directions.
#[cfg(not(feature = "wide-frames"))]
pub const FRAME_SIZE: usize = 64;

/// Total wire size of one frame, both directions (wide layout).
#[cfg(feature = "wide-frames")]
pub const FRAME_SIZE: usize = 256;

/// Number of inline argument/result words.
pub const INLINE_WORDS: usize = 12;

/// Inline argument capacity in bytes.
pub const INLINE_CAPACITY: usize = INLINE_WORDS * 4;

// Reserved padding keeps the checksum the final byte of the frame.
const CMD_RESERVED: usize = FRAME_SIZE - 4 - 4 - INLINE_CAPACITY - 2 - 1;
const RSP_RESERVED: usize = FRAME_SIZE - 4 - 4 - INLINE_CAPACITY - 1;

/// A host-to-firmware command frame.
///
/// Wire layout (little-endian):
/// ```text
/// ┌──────────┬──────────────┬────────────────┬───────────┬──────────┬──────────┐
/// │ sequence │ command_kind │ inline_args    │ stream_id │ reserved │ checksum │
/// │ (4B)     │ (4B)         │ (12 × 4B)      │ (2B)      │ (pad)    │ (1B)     │
/// └──────────┴──────────────┴────────────────┴───────────┴──────────┴──────────┘
/// ```
/// The checksum is the byte sum of every preceding byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    /// Correlation sequence number; never 0.
    pub sequence: u32,
    /// Command kind understood by the firmware.
    pub command_kind: u32,
    /// Inline argument words, or an embedded [`IndirectPackage`].
    pub inline_args: [u32; INLINE_WORDS],
    /// Stream this command targets.
    pub stream_id: u16,
}

impl CommandFrame {
    /// Pack an argument blob into inline words, zero-padded.
    pub fn args_from_bytes(bytes: &[u8]) -> Result<[u32; INLINE_WORDS]> {
        if bytes.len() > INLINE_CAPACITY {
            return Err(FrameError::ArgsTooLarge {
                size: bytes.len(),
                max: INLINE_CAPACITY,
            });
        }
        let mut padded = [0u8; INLINE_CAPACITY];
        padded[..bytes.len()].copy_from_slice(bytes);
        let mut words = [0u32; INLINE_WORDS];
        for (word, chunk) in words.iter_mut().zip(padded.chunks_exact(4)) {
            *word = u32::from_le_bytes(chunk.try_into().expect("chunk is 4 bytes"));
        }
        Ok(words)
    }

    /// Encode into the wire format, appending to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        let start = dst.len();
        dst.reserve(FRAME_SIZE);
        dst.put_u32_le(self.sequence);
        dst.put_u32_le(self.command_kind);
        for word in &self.inline_args {
            dst.put_u32_le(*word);
        }
        dst.put_u16_le(self.stream_id);
        dst.put_bytes(0, CMD_RESERVED);
        let checksum = byte_sum(&dst[start..]);
        dst.put_u8(checksum);
    }

    /// Encode into a fixed frame buffer.
    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        let mut buf = BytesMut::with_capacity(FRAME_SIZE);
        self.encode(&mut buf);
        let mut out = [0u8; FRAME_SIZE];
        out.copy_from_slice(&buf);
        out
    }

    /// Decode one frame, verifying length and checksum.
    pub fn decode(src: &[u8]) -> Result<Self> {
        let mut buf = checked_frame(src)?;
        let sequence = buf.get_u32_le();
        let command_kind = buf.get_u32_le();
        let mut inline_args = [0u32; INLINE_WORDS];
        for word in &mut inline_args {
            *word = buf.get_u32_le();
        }
        let stream_id = buf.get_u16_le();
        Ok(Self {
            sequence,
            command_kind,
            inline_args,
            stream_id,
        })
    }
}

/// A firmware-to-host response frame.
///
/// Same layout rules as [`CommandFrame`] without a stream field; the
/// stream is implied by the ring the frame arrives on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Sequence of the command this responds to, or 0 for unsolicited
    /// kinds (frame info, errors, heartbeats).
    pub sequence: u32,
    /// One of the kinds in [`crate::kinds`].
    pub response_kind: u32,
    /// Inline result words.
    pub inline_result: [u32; INLINE_WORDS],
}

impl ResponseFrame {
    /// Encode into the wire format, appending to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        let start = dst.len();
        dst.reserve(FRAME_SIZE);
        dst.put_u32_le(self.sequence);
        dst.put_u32_le(self.response_kind);
        for word in &self.inline_result {
            dst.put_u32_le(*word);
        }
        dst.put_bytes(0, RSP_RESERVED);
        let checksum = byte_sum(&dst[start..]);
        dst.put_u8(checksum);
    }

    /// Encode into a fixed frame buffer.
    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        let mut buf = BytesMut::with_capacity(FRAME_SIZE);
        self.encode(&mut buf);
        let mut out = [0u8; FRAME_SIZE];
        out.copy_from_slice(&buf);
        out
    }

    /// Decode one frame, verifying length and checksum.
    pub fn decode(src: &[u8]) -> Result<Self> {
        let mut buf = checked_frame(src)?;
        let sequence = buf.get_u32_le();
        let response_kind = buf.get_u32_le();
        let mut inline_result = [0u32; INLINE_WORDS];
        for word in &mut inline_result {
            *word = buf.get_u32_le();
        }
        Ok(Self {
            sequence,
            response_kind,
            inline_result,
        })
    }

    /// The inline result as little-endian bytes, for bounded copy-out
    /// into a caller's response buffer.
    pub fn result_bytes(&self) -> [u8; INLINE_CAPACITY] {
        let mut out = [0u8; INLINE_CAPACITY];
        for (chunk, word) in out.chunks_exact_mut(4).zip(&self.inline_result) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }
}

fn checked_frame(src: &[u8]) -> Result<&[u8]> {
    if src.len() < FRAME_SIZE {
        return Err(FrameError::Truncated {
            len: src.len(),
            need: FRAME_SIZE,
        });
    }
    let frame = &src[..FRAME_SIZE];
    if !verify_frame(frame) {
        return Err(FrameError::ChecksumMismatch {
            expected: frame[FRAME_SIZE - 1],
            actual: byte_sum(&frame[..FRAME_SIZE - 1]),
        });
    }
    Ok(frame)
}

/// Reference to an out-of-line command payload.
///
/// Embedded in the head of a command's inline words when the real
/// argument lives in a payload slot or an externally allocated buffer:
/// `u32 addr_lo; u32 addr_hi; u32 size; u8 checksum;`. The checksum
/// covers the 12 address/size bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndirectPackage {
    /// Device-visible address of the payload.
    pub addr: u64,
    /// Payload size in bytes.
    pub size: u32,
}

impl IndirectPackage {
    fn body_bytes(&self) -> [u8; 12] {
        let mut body = [0u8; 12];
        body[0..4].copy_from_slice(&(self.addr as u32).to_le_bytes());
        body[4..8].copy_from_slice(&((self.addr >> 32) as u32).to_le_bytes());
        body[8..12].copy_from_slice(&self.size.to_le_bytes());
        body
    }

    /// Encode into a full inline-argument block (trailing words zero).
    pub fn encode_args(&self) -> [u32; INLINE_WORDS] {
        let mut words = [0u32; INLINE_WORDS];
        words[0] = self.addr as u32;
        words[1] = (self.addr >> 32) as u32;
        words[2] = self.size;
        words[3] = u32::from(byte_sum(&self.body_bytes()));
        words
    }

    /// Decode from a command's inline words, verifying the package checksum.
    pub fn decode_args(args: &[u32; INLINE_WORDS]) -> Result<Self> {
        let package = Self {
            addr: u64::from(args[0]) | (u64::from(args[1]) << 32),
            size: args[2],
        };
        let actual = byte_sum(&package.body_bytes());
        let expected = args[3] as u8;
        if actual != expected {
            return Err(FrameError::ChecksumMismatch { expected, actual });
        }
        Ok(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_command() -> CommandFrame {
        CommandFrame {
            sequence: 7,
            command_kind: 0x42,
            inline_args: CommandFrame::args_from_bytes(b"set-exposure").unwrap(),
            stream_id: 2,
        }
    }

    #[test]
    fn command_roundtrip() {
        let frame = sample_command();
        let wire = frame.to_bytes();
        assert_eq!(wire.len(), FRAME_SIZE);
        assert_eq!(CommandFrame::decode(&wire).unwrap(), frame);
    }

    #[test]
    fn response_roundtrip() {
        let frame = ResponseFrame {
            sequence: 9,
            response_kind: crate::kinds::COMMAND_COMPLETE,
            inline_result: [0x11; INLINE_WORDS],
        };
        let wire = frame.to_bytes();
        assert_eq!(ResponseFrame::decode(&wire).unwrap(), frame);
    }

    #[test]
    fn checksum_is_final_byte() {
        let wire = sample_command().to_bytes();
        assert_eq!(wire[FRAME_SIZE - 1], byte_sum(&wire[..FRAME_SIZE - 1]));
    }

    #[test]
    fn every_byte_flip_fails_decode() {
        let wire = sample_command().to_bytes();
        for i in 0..FRAME_SIZE {
            let mut corrupted = wire;
            corrupted[i] ^= 0x01;
            assert!(
                CommandFrame::decode(&corrupted).is_err(),
                "flip at byte {i} went undetected"
            );
        }
    }

    #[test]
    fn truncated_frame_rejected() {
        let wire = sample_command().to_bytes();
        let err = CommandFrame::decode(&wire[..FRAME_SIZE - 1]).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { need, .. } if need == FRAME_SIZE));
    }

    #[test]
    fn corrupted_checksum_reports_both_values() {
        let mut wire = sample_command().to_bytes();
        let good = wire[FRAME_SIZE - 1];
        wire[FRAME_SIZE - 1] = good.wrapping_add(3);
        let err = CommandFrame::decode(&wire).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ChecksumMismatch { expected, actual }
                if expected == good.wrapping_add(3) && actual == good
        ));
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let frame = sample_command();
        let mut wire = frame.to_bytes().to_vec();
        wire.extend_from_slice(&[0xaa; 16]);
        assert_eq!(CommandFrame::decode(&wire).unwrap(), frame);
    }

    #[test]
    fn args_packing_is_little_endian_and_padded() {
        let words = CommandFrame::args_from_bytes(&[0x01, 0x02, 0x03, 0x04, 0x05]).unwrap();
        assert_eq!(words[0], 0x0403_0201);
        assert_eq!(words[1], 0x0000_0005);
        assert!(words[2..].iter().all(|w| *w == 0));
    }

    #[test]
    fn oversized_args_rejected() {
        let blob = vec![0u8; INLINE_CAPACITY + 1];
        let err = CommandFrame::args_from_bytes(&blob).unwrap_err();
        assert!(matches!(err, FrameError::ArgsTooLarge { max, .. } if max == INLINE_CAPACITY));
    }

    #[test]
    fn indirect_package_roundtrip() {
        let package = IndirectPackage {
            addr: 0x0000_00ab_cdef_0123,
            size: 4096,
        };
        let args = package.encode_args();
        assert_eq!(IndirectPackage::decode_args(&args).unwrap(), package);
    }

    #[test]
    fn indirect_package_detects_corrupted_address() {
        let package = IndirectPackage {
            addr: 0x1000_2000,
            size: 512,
        };
        let mut args = package.encode_args();
        args[0] ^= 0x10;
        assert!(matches!(
            IndirectPackage::decode_args(&args),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn response_result_bytes_match_words() {
        let frame = ResponseFrame {
            sequence: 1,
            response_kind: crate::kinds::FRAME_INFO,
            inline_result: CommandFrame::args_from_bytes(b"result-blob").unwrap(),
        };
        let bytes = frame.result_bytes();
        assert_eq!(&bytes[..11], b"result-blob");
        assert!(bytes[11..].iter().all(|b| *b == 0));
    }

    #[cfg(not(feature = "wide-frames"))]
    #[test]
    fn default_layout_is_64_bytes() {
        assert_eq!(FRAME_SIZE, 64);
    }

    #[cfg(feature = "wide-frames")]
    #[test]
    fn wide_layout_is_256_bytes() {
        assert_eq!(FRAME_SIZE, 256);
    }
}
