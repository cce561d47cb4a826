//! Hardware access seams for the isplink transport.
//!
//! The transport core never touches device registers or shared memory
//! directly. Everything goes through the three traits defined here:
//! - [`RegisterBank`] — 32-bit MMIO register access
//! - [`ShmRegion`] — bounds-checked byte access into one shared-memory extent
//! - [`MemoryProvider`] — external allocation fallback for oversized payloads
//!
//! In-memory implementations ([`MemRegisterBank`], [`HeapRegion`],
//! [`HeapMemoryProvider`]) back unit tests, the loopback demo, and any
//! environment without real hardware. The [`regs`] module holds the ring
//! register map shared with the firmware.

pub mod error;
pub mod mem;
pub mod regs;
pub mod traits;

pub use error::{MmioError, Result};
pub use mem::{HeapMemoryProvider, HeapRegion, MemRegisterBank};
pub use regs::{command_ring_regs, response_ring_regs, RingRegs, RING_STREAMS};
pub use traits::{ExternalBuffer, MemoryProvider, RegisterBank, ShmRegion};
