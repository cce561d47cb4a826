//! Ring register map.
//!
//! The firmware exposes one register block per ring: four command rings
//! (host to firmware) followed by four response rings (firmware to host),
//! one pair per stream — global plus up to three channel streams. Each
//! block holds the ring's read cursor, write cursor, 64-bit shared-memory
//! base and byte size at fixed offsets.

/// Number of streams with a command/response ring pair.
pub const RING_STREAMS: u16 = 4;

/// Byte offset of the first command ring register block.
pub const COMMAND_RING_BASE: u32 = 0x0400;

/// Byte offset of the first response ring register block.
pub const RESPONSE_RING_BASE: u32 = 0x0480;

/// Stride between consecutive ring register blocks.
pub const RING_BLOCK_STRIDE: u32 = 0x20;

/// Offsets within one ring register block.
pub const REG_READ_PTR: u32 = 0x00;
pub const REG_WRITE_PTR: u32 = 0x04;
pub const REG_BASE_LO: u32 = 0x08;
pub const REG_BASE_HI: u32 = 0x0c;
pub const REG_SIZE: u32 = 0x10;

/// Register offsets for one ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingRegs {
    pub read_ptr: u32,
    pub write_ptr: u32,
    pub base_lo: u32,
    pub base_hi: u32,
    pub size: u32,
}

impl RingRegs {
    /// Register offsets for the block starting at `base`.
    pub const fn at(base: u32) -> Self {
        Self {
            read_ptr: base + REG_READ_PTR,
            write_ptr: base + REG_WRITE_PTR,
            base_lo: base + REG_BASE_LO,
            base_hi: base + REG_BASE_HI,
            size: base + REG_SIZE,
        }
    }
}

/// Register offsets for a stream's command ring (host to firmware).
pub fn command_ring_regs(stream: u16) -> RingRegs {
    debug_assert!(stream < RING_STREAMS, "stream {stream} out of range");
    RingRegs::at(COMMAND_RING_BASE + u32::from(stream) * RING_BLOCK_STRIDE)
}

/// Register offsets for a stream's response ring (firmware to host).
pub fn response_ring_regs(stream: u16) -> RingRegs {
    debug_assert!(stream < RING_STREAMS, "stream {stream} out of range");
    RingRegs::at(RESPONSE_RING_BASE + u32::from(stream) * RING_BLOCK_STRIDE)
}
