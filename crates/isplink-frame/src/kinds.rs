//! Response kinds.
//!
//! The firmware tags every response frame with one of a closed set of
//! kinds. Command completions resolve pending commands; the rest fan out
//! to the owning channel's event callback.

/// A previously sent command completed. `inline_result[0]` echoes the
/// completed command's kind; the remaining words carry the result.
pub const COMMAND_COMPLETE: u32 = 0x0001;

/// A frame-control request (start/stop/drop) finished.
pub const FRAME_CONTROL_COMPLETE: u32 = 0x0002;

/// Per-frame statistics and metadata produced during streaming.
pub const FRAME_INFO: u32 = 0x0003;

/// Asynchronous firmware error report.
pub const FIRMWARE_ERROR: u32 = 0x0004;

/// Periodic liveness beacon.
pub const HEARTBEAT: u32 = 0x0005;

/// Returns a human-readable name for a response kind.
pub fn response_kind_name(kind: u32) -> &'static str {
    match kind {
        COMMAND_COMPLETE => "COMMAND_COMPLETE",
        FRAME_CONTROL_COMPLETE => "FRAME_CONTROL_COMPLETE",
        FRAME_INFO => "FRAME_INFO",
        FIRMWARE_ERROR => "FIRMWARE_ERROR",
        HEARTBEAT => "HEARTBEAT",
        _ => "UNKNOWN",
    }
}
