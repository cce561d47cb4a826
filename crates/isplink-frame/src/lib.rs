//! Fixed-size command/response framing for the isplink transport.
//!
//! Every message crossing a ring is one fixed-size frame:
//! - A 4-byte sequence number for response correlation
//! - A 4-byte command or response kind
//! - 48 bytes of inline argument/result words
//! - A trailing byte-sum checksum over the rest of the frame
//!
//! Arguments that do not fit inline travel out-of-line, referenced by an
//! [`IndirectPackage`] embedded in the inline words. The `wide-frames`
//! feature pads frames to 256 bytes for firmware builds using the wide
//! layout; the checksum stays the final byte either way.

pub mod checksum;
pub mod codec;
pub mod error;
pub mod kinds;
pub mod sequence;
pub mod stream;

pub use checksum::{byte_sum, verify_frame};
pub use codec::{
    CommandFrame, IndirectPackage, ResponseFrame, FRAME_SIZE, INLINE_CAPACITY, INLINE_WORDS,
};
pub use error::{FrameError, Result};
pub use kinds::{
    response_kind_name, COMMAND_COMPLETE, FIRMWARE_ERROR, FRAME_CONTROL_COMPLETE, FRAME_INFO,
    HEARTBEAT,
};
pub use sequence::SequenceAllocator;
pub use stream::{stream_name, GLOBAL, STREAM1, STREAM2, STREAM3, STREAM_COUNT};
