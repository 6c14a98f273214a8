//! The raw register access primitive.
//!
//! Mapping BAR0 and performing the actual memory-mapped reads and writes
//! is the embedding driver's job; this crate only consumes the mapped
//! window through [`MmioBus`]. An implementation is expected to be cheap
//! to call (a handful of nanoseconds) and shareable between threads; the
//! serialization of multi-register sequences happens above it.

#[cfg(test)]
pub(crate) mod test;

/// One adapter's mapped register window.
pub trait MmioBus: Send + Sync {
    /// Read a 32-bit register at a byte offset into the window.
    fn read(&self, offset: u32) -> Result<u32, MmioError>;

    /// Write a 32-bit register at a byte offset into the window.
    fn write(&self, offset: u32, value: u32) -> Result<(), MmioError>;
}

/// Failures the mapped window itself can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MmioError {
    /// The window is gone or the device stopped decoding accesses.
    /// Irrecoverable; the owning context moves to its error state.
    #[error("register window fault")]
    Fault,

    /// The access did not complete in time. Retryable.
    #[error("register access timed out")]
    Timeout,
}
