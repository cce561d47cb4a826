/// Errors that can occur at the hardware access seams.
#[derive(Debug, thiserror::Error)]
pub enum MmioError {
    /// An access fell outside the shared-memory extent.
    #[error("shared-memory access out of bounds (offset {offset} + len {len} > capacity {capacity})")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// The external memory provider could not satisfy an allocation.
    #[error("external allocation of {size} bytes failed")]
    AllocFailed { size: usize },
}

pub type Result<T> = std::result::Result<T, MmioError>;
