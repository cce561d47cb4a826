//! Well-known stream IDs.
//!
//! Every frame belongs to one logical stream: the global stream carries
//! device-wide commands, streams 1-3 are bound to active processing
//! channels. Each stream owns one command ring and one response ring.

/// Device-wide commands and responses.
pub const GLOBAL: u16 = 0;

/// Stream bound to processing channel 1.
pub const STREAM1: u16 = 1;

/// Stream bound to processing channel 2.
pub const STREAM2: u16 = 2;

/// Stream bound to processing channel 3.
pub const STREAM3: u16 = 3;

/// Total number of streams (global + channel streams).
pub const STREAM_COUNT: u16 = isplink_mmio::regs::RING_STREAMS;

/// Returns a human-readable name for a stream ID.
pub fn stream_name(id: u16) -> &'static str {
    match id {
        GLOBAL => "GLOBAL",
        STREAM1 => "STREAM1",
        STREAM2 => "STREAM2",
        STREAM3 => "STREAM3",
        _ => "INVALID",
    }
}

/// Returns true if the stream ID maps to a ring pair.
pub fn is_valid(id: u16) -> bool {
    id < STREAM_COUNT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_cover_all_streams() {
        for id in 0..STREAM_COUNT {
            assert_ne!(stream_name(id), "INVALID");
            assert!(is_valid(id));
        }
        assert_eq!(stream_name(STREAM_COUNT), "INVALID");
        assert!(!is_valid(STREAM_COUNT));
    }
}
