use std::sync::{Arc, Mutex};

use isplink_mmio::{RegisterBank, RingRegs, ShmRegion};

use crate::error::RingError;

/// One circular shared-memory channel with hardware-visible cursors.
///
/// A ring moves fixed-size frames in one direction; the host inserts
/// into command rings and drains response rings, the firmware does the
/// opposite. Both cursors live in [`RegisterBank`] registers: the writer
/// owns the write cursor and only advances it after a frame is fully
/// copied in; the reader owns the read cursor and only advances it after
/// a frame is fully copied out.
///
/// Cursor read-modify-publish sequences are serialized by a per-ring
/// mutex so register-pair updates never interleave.
pub struct RingChannel {
    bank: Arc<dyn RegisterBank>,
    regs: RingRegs,
    region: Arc<dyn ShmRegion>,
    capacity: u32,
    cursor_lock: Mutex<()>,
}

impl RingChannel {
    /// Program a ring's registers and wrap it: publishes the device base
    /// address and region size, zeroes both cursors. Host-side setup path.
    pub fn init(
        bank: Arc<dyn RegisterBank>,
        regs: RingRegs,
        region: Arc<dyn ShmRegion>,
        device_base: u64,
    ) -> Result<Self, RingError> {
        let capacity = Self::checked_capacity(&*region)?;
        bank.write32(regs.base_lo, device_base as u32);
        bank.write32(regs.base_hi, (device_base >> 32) as u32);
        bank.write32(regs.size, capacity);
        bank.write32(regs.read_ptr, 0);
        bank.write32(regs.write_ptr, 0);
        Ok(Self {
            bank,
            regs,
            region,
            capacity,
            cursor_lock: Mutex::new(()),
        })
    }

    /// Wrap an already-programmed ring. The size register must match the
    /// backing region.
    pub fn attach(
        bank: Arc<dyn RegisterBank>,
        regs: RingRegs,
        region: Arc<dyn ShmRegion>,
    ) -> Result<Self, RingError> {
        let capacity = Self::checked_capacity(&*region)?;
        let programmed = bank.read32(regs.size);
        if programmed != capacity {
            return Err(RingError::Geometry {
                reason: format!(
                    "size register {programmed} does not match region length {capacity}"
                ),
            });
        }
        Ok(Self {
            bank,
            regs,
            region,
            capacity,
            cursor_lock: Mutex::new(()),
        })
    }

    fn checked_capacity(region: &dyn ShmRegion) -> Result<u32, RingError> {
        let len = region.len();
        if len == 0 || len > u32::MAX as usize {
            return Err(RingError::Geometry {
                reason: format!("region length {len} not addressable by 32-bit cursors"),
            });
        }
        Ok(len as u32)
    }

    /// Ring capacity in bytes.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Try to insert one frame.
    ///
    /// Returns [`RingError::Busy`] without mutating anything when the
    /// frame does not fit; the caller retries. Cursor values beyond the
    /// capacity are register corruption and fail hard.
    pub fn try_insert(&self, frame: &[u8]) -> Result<(), RingError> {
        let frame_len = frame.len() as u32;
        debug_assert!(frame_len > 0 && frame_len <= self.capacity);

        let _guard = self.cursor_lock.lock().expect("ring cursor lock poisoned");
        let write_ptr = self.bank.read32(self.regs.write_ptr);
        let read_ptr = self.bank.read32(self.regs.read_ptr);
        self.check_cursors(read_ptr, write_ptr)?;

        let wraps = write_ptr + frame_len >= self.capacity;
        let next = (write_ptr + frame_len) % self.capacity;
        let full = if write_ptr >= read_ptr {
            // Free space is [write..capacity) plus [0..read); inserting
            // must not wrap around onto unread frames.
            wraps && next >= read_ptr
        } else {
            // Free space is [write..read); any wrap collides with the
            // unread span straddling the end of the region.
            wraps || next >= read_ptr
        };
        if full {
            return Err(RingError::Busy);
        }

        // Split copy across the wrap boundary; byte-identical to a
        // non-wrapping copy at the same logical offset.
        let first = frame.len().min((self.capacity - write_ptr) as usize);
        self.region.write_at(write_ptr as usize, &frame[..first])?;
        if first < frame.len() {
            self.region.write_at(0, &frame[first..])?;
        }

        self.bank.write32(self.regs.write_ptr, next);
        Ok(())
    }

    /// Try to read one frame into `out`.
    ///
    /// Returns `Ok(false)` when the ring is empty. The frame checksum is
    /// not verified here; that is the caller's job.
    pub fn try_read(&self, out: &mut [u8]) -> Result<bool, RingError> {
        let frame_len = out.len() as u32;
        debug_assert!(frame_len > 0 && frame_len <= self.capacity);

        let _guard = self.cursor_lock.lock().expect("ring cursor lock poisoned");
        let write_ptr = self.bank.read32(self.regs.write_ptr);
        let read_ptr = self.bank.read32(self.regs.read_ptr);
        self.check_cursors(read_ptr, write_ptr)?;

        if read_ptr == write_ptr {
            return Ok(false);
        }

        let first = out.len().min((self.capacity - read_ptr) as usize);
        self.region.read_at(read_ptr as usize, &mut out[..first])?;
        if first < out.len() {
            self.region.read_at(0, &mut out[first..])?;
        }

        let next = (read_ptr + frame_len) % self.capacity;
        self.bank.write32(self.regs.read_ptr, next);
        Ok(true)
    }

    fn check_cursors(&self, read_ptr: u32, write_ptr: u32) -> Result<(), RingError> {
        if read_ptr > self.capacity || write_ptr > self.capacity {
            return Err(RingError::Corrupt {
                read_ptr,
                write_ptr,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for RingChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingChannel")
            .field("regs", &self.regs)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use isplink_mmio::{command_ring_regs, HeapRegion, MemRegisterBank};

    use super::*;

    const FRAME: usize = 64;

    fn ring_with_capacity(capacity: usize) -> (Arc<MemRegisterBank>, RingChannel) {
        let bank = Arc::new(MemRegisterBank::new());
        let region = Arc::new(HeapRegion::new(capacity));
        let ring = RingChannel::init(
            Arc::clone(&bank) as Arc<dyn RegisterBank>,
            command_ring_regs(0),
            region,
            0x1000_0000,
        )
        .expect("ring should initialize");
        (bank, ring)
    }

    fn pattern(seed: u8) -> [u8; FRAME] {
        let mut frame = [0u8; FRAME];
        for (i, byte) in frame.iter_mut().enumerate() {
            *byte = seed.wrapping_add(i as u8);
        }
        frame
    }

    #[test]
    fn init_programs_registers() {
        let (bank, ring) = ring_with_capacity(4 * FRAME);
        let regs = command_ring_regs(0);
        assert_eq!(bank.read32(regs.base_lo), 0x1000_0000);
        assert_eq!(bank.read32(regs.base_hi), 0);
        assert_eq!(bank.read32(regs.size), ring.capacity());
        assert_eq!(bank.read32(regs.read_ptr), 0);
        assert_eq!(bank.read32(regs.write_ptr), 0);
    }

    #[test]
    fn attach_rejects_mismatched_size_register() {
        let bank = Arc::new(MemRegisterBank::new());
        let regs = command_ring_regs(1);
        bank.write32(regs.size, 128);
        let region = Arc::new(HeapRegion::new(256));
        let err = RingChannel::attach(bank as Arc<dyn RegisterBank>, regs, region).unwrap_err();
        assert!(matches!(err, RingError::Geometry { .. }));
    }

    #[test]
    fn empty_ring_reads_nothing() {
        let (_bank, ring) = ring_with_capacity(4 * FRAME);
        let mut out = [0u8; FRAME];
        assert!(!ring.try_read(&mut out).unwrap());
    }

    #[test]
    fn insert_then_read_roundtrips() {
        let (_bank, ring) = ring_with_capacity(4 * FRAME);
        let frame = pattern(0x10);
        ring.try_insert(&frame).unwrap();

        let mut out = [0u8; FRAME];
        assert!(ring.try_read(&mut out).unwrap());
        assert_eq!(out, frame);
        assert!(!ring.try_read(&mut out).unwrap());
    }

    #[test]
    fn frames_come_out_fifo() {
        let (_bank, ring) = ring_with_capacity(4 * FRAME);
        for seed in [1u8, 2, 3] {
            ring.try_insert(&pattern(seed)).unwrap();
        }
        let mut out = [0u8; FRAME];
        for seed in [1u8, 2, 3] {
            assert!(ring.try_read(&mut out).unwrap());
            assert_eq!(out, pattern(seed));
        }
    }

    #[test]
    fn full_ring_returns_busy_without_mutation() {
        let (bank, ring) = ring_with_capacity(4 * FRAME);
        for seed in 0..3 {
            ring.try_insert(&pattern(seed)).unwrap();
        }
        // One slot stays free to disambiguate full from empty.
        let write_before = bank.read32(command_ring_regs(0).write_ptr);
        assert!(matches!(
            ring.try_insert(&pattern(9)),
            Err(RingError::Busy)
        ));
        assert_eq!(bank.read32(command_ring_regs(0).write_ptr), write_before);

        // Draining one frame makes room again.
        let mut out = [0u8; FRAME];
        assert!(ring.try_read(&mut out).unwrap());
        ring.try_insert(&pattern(9)).unwrap();
    }

    #[test]
    fn wrapped_frame_is_byte_identical() {
        // Capacity deliberately not a frame multiple so a frame straddles
        // the end of the region.
        let (_bank, ring) = ring_with_capacity(FRAME + FRAME / 2);
        let mut out = [0u8; FRAME];

        ring.try_insert(&pattern(0x40)).unwrap();
        assert!(ring.try_read(&mut out).unwrap());
        assert_eq!(out, pattern(0x40));

        // Cursors now sit at 64 of 96; the next frame wraps 32/32.
        let wrapped = pattern(0x77);
        ring.try_insert(&wrapped).unwrap();
        assert!(ring.try_read(&mut out).unwrap());
        assert_eq!(out, wrapped, "wrapped copy differs from original frame");
    }

    #[test]
    fn wrapped_writer_does_not_clobber_unread_frame() {
        // Leave one unread frame straddling the end of the region, with
        // the write cursor wrapped behind the read cursor.
        let (_bank, ring) = ring_with_capacity(FRAME + FRAME / 2);
        let mut out = [0u8; FRAME];

        ring.try_insert(&pattern(0x01)).unwrap();
        assert!(ring.try_read(&mut out).unwrap());
        let straddling = pattern(0x02);
        ring.try_insert(&straddling).unwrap();

        // Cursors: write 32, read 64. Another frame must not fit.
        assert!(matches!(
            ring.try_insert(&pattern(0x03)),
            Err(RingError::Busy)
        ));
        assert!(ring.try_read(&mut out).unwrap());
        assert_eq!(out, straddling);
    }

    #[test]
    fn sustained_traffic_across_many_wraps() {
        let (_bank, ring) = ring_with_capacity(4 * FRAME);
        let mut out = [0u8; FRAME];
        for round in 0..64u8 {
            ring.try_insert(&pattern(round)).unwrap();
            ring.try_insert(&pattern(round.wrapping_add(100))).unwrap();
            assert!(ring.try_read(&mut out).unwrap());
            assert_eq!(out, pattern(round));
            assert!(ring.try_read(&mut out).unwrap());
            assert_eq!(out, pattern(round.wrapping_add(100)));
        }
    }

    #[test]
    fn corrupt_write_cursor_is_fatal() {
        let (bank, ring) = ring_with_capacity(4 * FRAME);
        bank.write32(command_ring_regs(0).write_ptr, 0xffff_0000);
        let mut out = [0u8; FRAME];
        assert!(matches!(
            ring.try_read(&mut out),
            Err(RingError::Corrupt { .. })
        ));
        assert!(matches!(
            ring.try_insert(&pattern(1)),
            Err(RingError::Corrupt { .. })
        ));
    }

    #[test]
    fn corrupt_read_cursor_is_fatal() {
        let (bank, ring) = ring_with_capacity(4 * FRAME);
        bank.write32(command_ring_regs(0).read_ptr, ring.capacity() + 1);
        let mut out = [0u8; FRAME];
        assert!(matches!(
            ring.try_read(&mut out),
            Err(RingError::Corrupt { .. })
        ));
    }

    #[test]
    fn zero_length_region_rejected() {
        let bank = Arc::new(MemRegisterBank::new());
        let region = Arc::new(HeapRegion::new(0));
        let err = RingChannel::init(
            bank as Arc<dyn RegisterBank>,
            command_ring_regs(0),
            region,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, RingError::Geometry { .. }));
    }
}
