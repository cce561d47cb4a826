/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame checksum does not match its contents.
    #[error("checksum mismatch (expected {expected:#04x}, computed {actual:#04x})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// The buffer is shorter than one full frame.
    #[error("truncated frame ({len} bytes, need {need})")]
    Truncated { len: usize, need: usize },

    /// An inline argument blob exceeds the frame's inline capacity.
    #[error("inline arguments too large ({size} bytes, max {max})")]
    ArgsTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
