use std::sync::{Arc, Mutex};

use isplink_mmio::{MmioError, ShmRegion};

use crate::error::RingError;

/// Fixed-slot arena for out-of-line command payloads.
///
/// The arena is carved out of one shared-memory region reserved next to
/// the rings. Slots are handed out when a command's argument exceeds the
/// frame's inline capacity and reclaimed when the owning command
/// resolves — by completion, timeout, or stream teardown.
///
/// Free slots are tracked as an index stack; a [`PayloadSlot`] is a
/// non-clonable owning handle, so releasing it twice is not expressible
/// in safe code.
pub struct PayloadPool {
    region: Arc<dyn ShmRegion>,
    device_base: u64,
    slot_size: usize,
    slot_count: usize,
    free: Mutex<Vec<u16>>,
}

/// An owned slot in the indirect payload arena.
///
/// Belongs to at most one pending command at a time. Returned to the
/// pool only through [`PayloadPool::release`], which consumes it.
pub struct PayloadSlot {
    index: u16,
    offset: usize,
    device_addr: u64,
    capacity: usize,
    region: Arc<dyn ShmRegion>,
}

impl PayloadSlot {
    /// Device-visible address of this slot.
    pub fn device_addr(&self) -> u64 {
        self.device_addr
    }

    /// Slot capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy a payload into the slot.
    pub fn write(&self, data: &[u8]) -> Result<(), RingError> {
        if data.len() > self.capacity {
            return Err(RingError::Shm(MmioError::OutOfBounds {
                offset: 0,
                len: data.len(),
                capacity: self.capacity,
            }));
        }
        self.region.write_at(self.offset, data)?;
        Ok(())
    }

    /// Copy the slot contents back out (test and diagnostic path).
    pub fn read(&self, out: &mut [u8]) -> Result<(), RingError> {
        if out.len() > self.capacity {
            return Err(RingError::Shm(MmioError::OutOfBounds {
                offset: 0,
                len: out.len(),
                capacity: self.capacity,
            }));
        }
        self.region.read_at(self.offset, out)?;
        Ok(())
    }
}

impl std::fmt::Debug for PayloadSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadSlot")
            .field("index", &self.index)
            .field("device_addr", &format_args!("{:#x}", self.device_addr))
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl PayloadPool {
    /// Create a pool of `slot_count` slots of `slot_size` bytes over a
    /// reserved region starting at `device_base` in the device's address
    /// space.
    pub fn new(
        region: Arc<dyn ShmRegion>,
        device_base: u64,
        slot_count: usize,
        slot_size: usize,
    ) -> Result<Self, RingError> {
        if slot_count == 0 || slot_size == 0 || slot_count > u16::MAX as usize {
            return Err(RingError::Geometry {
                reason: format!("bad pool geometry ({slot_count} slots of {slot_size} bytes)"),
            });
        }
        let needed = slot_count * slot_size;
        if needed > region.len() {
            return Err(RingError::Geometry {
                reason: format!(
                    "pool needs {needed} bytes but region holds {}",
                    region.len()
                ),
            });
        }
        // Stack order: slot 0 comes out first.
        let free = (0..slot_count as u16).rev().collect();
        Ok(Self {
            region,
            device_base,
            slot_size,
            slot_count,
            free: Mutex::new(free),
        })
    }

    /// Slot capacity in bytes.
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slot_count
    }

    /// Number of slots currently acquired.
    pub fn outstanding(&self) -> usize {
        let free = self.free.lock().expect("pool free list lock poisoned");
        self.slot_count - free.len()
    }

    /// Pop a free slot, or [`RingError::OutOfSlots`] if the pool is
    /// exhausted (callers fall back to the external memory provider).
    pub fn acquire(&self) -> Result<PayloadSlot, RingError> {
        let mut free = self.free.lock().expect("pool free list lock poisoned");
        let index = free.pop().ok_or(RingError::OutOfSlots)?;
        let offset = index as usize * self.slot_size;
        Ok(PayloadSlot {
            index,
            offset,
            device_addr: self.device_base + offset as u64,
            capacity: self.slot_size,
            region: Arc::clone(&self.region),
        })
    }

    /// Return a slot to the free list.
    pub fn release(&self, slot: PayloadSlot) {
        let mut free = self.free.lock().expect("pool free list lock poisoned");
        debug_assert!(
            !free.contains(&slot.index),
            "slot {} released while already free",
            slot.index
        );
        free.push(slot.index);
    }
}

impl std::fmt::Debug for PayloadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadPool")
            .field("device_base", &format_args!("{:#x}", self.device_base))
            .field("slot_size", &self.slot_size)
            .field("slot_count", &self.slot_count)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}
