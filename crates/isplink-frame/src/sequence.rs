use std::sync::atomic::{AtomicU32, Ordering};

/// Issues strictly increasing 32-bit command sequence numbers.
///
/// Starts at 1 and never returns 0 — a zero sequence marks an
/// uninitialized frame slot on the firmware side. Safe under concurrent
/// callers; each caller gets a distinct value.
#[derive(Debug)]
pub struct SequenceAllocator {
    next: AtomicU32,
}

impl SequenceAllocator {
    /// Create an allocator whose first issued sequence is 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    /// Return the next sequence number.
    pub fn next(&self) -> u32 {
        loop {
            let seq = self.next.fetch_add(1, Ordering::Relaxed);
            // Skip 0 if the counter ever wraps.
            if seq != 0 {
                return seq;
            }
        }
    }
}

impl Default for SequenceAllocator {
    fn default() -> Self {
        Self::new()
    }
}
