use std::sync::Arc;

use crate::error::Result;

/// 32-bit MMIO register access.
///
/// The transport reads and publishes ring cursors through this trait.
/// On real hardware this maps to volatile loads/stores against a BAR;
/// tests supply [`crate::MemRegisterBank`] instead.
///
/// Implementations must be safe for concurrent readers. Writers that
/// need register-pair atomicity (e.g. a cursor publish paired with a
/// shared-memory copy) are expected to serialize externally; the ring
/// layer holds its own critical section around such sequences.
pub trait RegisterBank: Send + Sync {
    /// Read a 32-bit register at a byte offset.
    fn read32(&self, offset: u32) -> u32;

    /// Write a 32-bit register at a byte offset.
    fn write32(&self, offset: u32, value: u32);
}

/// Bounds-checked byte access into one shared-memory extent.
///
/// Each ring buffer and the indirect-payload arena are views into
/// memory that the firmware also sees. Offsets are relative to the
/// start of the extent; every access is checked against [`len`].
///
/// [`len`]: ShmRegion::len
pub trait ShmRegion: Send + Sync {
    /// Size of the extent in bytes.
    fn len(&self) -> usize;

    /// True if the extent is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `out.len()` bytes starting at `offset` into `out`.
    fn read_at(&self, offset: usize, out: &mut [u8]) -> Result<()>;

    /// Copy `data` into the extent starting at `offset`.
    fn write_at(&self, offset: usize, data: &[u8]) -> Result<()>;
}

/// A buffer obtained from the external memory provider.
///
/// Carries the device-visible address the firmware will dereference and
/// a host-side view for filling in the payload bytes.
pub struct ExternalBuffer {
    /// Address of the buffer in the device's address space.
    pub device_addr: u64,
    /// Host-side access to the buffer contents.
    pub region: Arc<dyn ShmRegion>,
}

impl std::fmt::Debug for ExternalBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalBuffer")
            .field("device_addr", &format_args!("{:#x}", self.device_addr))
            .field("len", &self.region.len())
            .finish()
    }
}

/// External allocation fallback.
///
/// Used when a command payload does not fit a pool slot, or the pool is
/// exhausted. Real implementations delegate to the platform's DMA-capable
/// allocator; tests use [`crate::HeapMemoryProvider`].
pub trait MemoryProvider: Send + Sync {
    /// Allocate a buffer of at least `size` bytes.
    fn alloc(&self, size: usize) -> Result<ExternalBuffer>;

    /// Return a buffer to the provider.
    fn free(&self, buffer: ExternalBuffer);
}
