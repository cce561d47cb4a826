//! Host-side shared-memory command transport for an image-processing
//! coprocessor.
//!
//! isplink frames commands with sequence numbers and checksums, moves
//! them through per-stream ring buffers whose cursors live in
//! memory-mapped registers, tracks in-flight commands for response
//! correlation, and runs one dispatcher per stream to turn incoming
//! response frames into wakeups and callbacks.
//!
//! # Crate Structure
//!
//! - [`mmio`] — Register-bank, shared-memory and allocator seams
//! - [`frame`] — Fixed-size command/response framing with checksums
//! - [`host`] — Rings, payload pool, pending table, transport, dispatchers

/// Re-export hardware seam types.
pub mod mmio {
    pub use isplink_mmio::*;
}

/// Re-export frame types.
pub mod frame {
    pub use isplink_frame::*;
}

/// Re-export transport types.
pub mod host {
    pub use isplink_host::*;
}
