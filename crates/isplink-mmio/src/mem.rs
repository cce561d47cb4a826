//! In-memory implementations of the hardware seams.
//!
//! These back unit tests and the loopback demo, and double as the
//! reference semantics for real MMIO-backed implementations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::error::{MmioError, Result};
use crate::traits::{ExternalBuffer, MemoryProvider, RegisterBank, ShmRegion};

/// Register bank backed by a mutex-guarded map.
///
/// Unwritten registers read as zero, matching post-reset hardware state.
#[derive(Debug, Default)]
pub struct MemRegisterBank {
    regs: Mutex<HashMap<u32, u32>>,
}

impl MemRegisterBank {
    /// Create an empty register bank (all registers read as zero).
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegisterBank for MemRegisterBank {
    fn read32(&self, offset: u32) -> u32 {
        let regs = self.regs.lock().expect("register map lock poisoned");
        regs.get(&offset).copied().unwrap_or(0)
    }

    fn write32(&self, offset: u32, value: u32) {
        let mut regs = self.regs.lock().expect("register map lock poisoned");
        regs.insert(offset, value);
    }
}

/// Shared-memory extent backed by a mutex-guarded byte vector.
#[derive(Debug)]
pub struct HeapRegion {
    bytes: Mutex<Vec<u8>>,
    len: usize,
}

impl HeapRegion {
    /// Create a zero-filled extent of `len` bytes.
    pub fn new(len: usize) -> Self {
        Self {
            bytes: Mutex::new(vec![0u8; len]),
            len,
        }
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        if offset.checked_add(len).is_none_or(|end| end > self.len) {
            return Err(MmioError::OutOfBounds {
                offset,
                len,
                capacity: self.len,
            });
        }
        Ok(())
    }
}

impl ShmRegion for HeapRegion {
    fn len(&self) -> usize {
        self.len
    }

    fn read_at(&self, offset: usize, out: &mut [u8]) -> Result<()> {
        self.check(offset, out.len())?;
        let bytes = self.bytes.lock().expect("region lock poisoned");
        out.copy_from_slice(&bytes[offset..offset + out.len()]);
        Ok(())
    }

    fn write_at(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.check(offset, data.len())?;
        let mut bytes = self.bytes.lock().expect("region lock poisoned");
        bytes[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}

/// Memory provider that allocates heap-backed buffers.
///
/// Device addresses are synthesized from a counter so tests can assert
/// that distinct allocations get distinct addresses.
#[derive(Debug)]
pub struct HeapMemoryProvider {
    next_addr: AtomicU64,
    outstanding: AtomicU64,
}

impl HeapMemoryProvider {
    /// Device-address range where synthetic allocations start.
    pub const ALLOC_BASE: u64 = 0x8000_0000;

    pub fn new() -> Self {
        Self {
            next_addr: AtomicU64::new(Self::ALLOC_BASE),
            outstanding: AtomicU64::new(0),
        }
    }

    /// Number of buffers allocated and not yet freed.
    pub fn outstanding(&self) -> u64 {
        self.outstanding.load(Ordering::SeqCst)
    }
}

impl Default for HeapMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider for HeapMemoryProvider {
    fn alloc(&self, size: usize) -> Result<ExternalBuffer> {
        if size == 0 {
            return Err(MmioError::AllocFailed { size });
        }
        let device_addr = self
            .next_addr
            .fetch_add(size.next_multiple_of(4096) as u64, Ordering::SeqCst);
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        trace!(size, device_addr = format_args!("{device_addr:#x}"), "allocated external buffer");
        Ok(ExternalBuffer {
            device_addr,
            region: Arc::new(HeapRegion::new(size)),
        })
    }

    fn free(&self, buffer: ExternalBuffer) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        trace!(device_addr = format_args!("{:#x}", buffer.device_addr), "freed external buffer");
        drop(buffer);
    }
}
