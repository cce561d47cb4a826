use std::time::Duration;

use isplink_mmio::MmioError;

/// Errors raised by the ring and pool layers.
#[derive(Debug, thiserror::Error)]
pub enum RingError {
    /// No free space for another frame. Expected under load; retryable.
    #[error("ring full")]
    Busy,

    /// The indirect payload pool has no free slot. The send path falls
    /// back to the external memory provider.
    #[error("payload pool exhausted")]
    OutOfSlots,

    /// Ring cursor registers are outside the valid range. Indicates a
    /// hardware or memory fault; fatal to this ring.
    #[error(
        "ring cursors corrupt (read {read_ptr:#x}, write {write_ptr:#x}, capacity {capacity:#x})"
    )]
    Corrupt {
        read_ptr: u32,
        write_ptr: u32,
        capacity: u32,
    },

    /// The ring or pool geometry does not fit its backing region.
    #[error("bad geometry: {reason}")]
    Geometry { reason: String },

    /// Shared-memory access failed.
    #[error("shared memory error: {0}")]
    Shm(#[from] MmioError),
}

/// Errors returned to callers of the transport send API.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The command ring stayed full through the whole retry budget.
    /// The command was rolled back; the caller may retry later.
    #[error("command ring busy after {attempts} attempts")]
    Busy { attempts: u32 },

    /// A synchronous wait exceeded its deadline. The pending entry and
    /// its resources were reclaimed.
    #[error("timed out after {0:?} waiting for response")]
    Timeout(Duration),

    /// The stream ID has no configured ring pair.
    #[error("unknown stream {0}")]
    UnknownStream(u16),

    /// The stream was torn down while the command was outstanding.
    #[error("stream {0} torn down")]
    TornDown(u16),

    /// The command arguments could not be framed.
    #[error("frame error: {0}")]
    Frame(#[from] isplink_frame::FrameError),

    /// Out-of-line payload allocation failed (pool fallback included).
    #[error("payload allocation failed: {0}")]
    Alloc(#[from] MmioError),

    /// The command ring failed in a non-retryable way.
    #[error("ring failure: {0}")]
    Ring(RingError),
}

pub type Result<T> = std::result::Result<T, SendError>;
