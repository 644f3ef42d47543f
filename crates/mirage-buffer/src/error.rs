//! Buffer core error types.

use crate::device::BufferUsage;
use crate::format::Format;
use crate::handle::BufferHandle;
use thiserror::Error;

/// Errors produced by the buffer core and its device collaborators.
#[derive(Debug, Error)]
pub enum BufferError {
    /// Device memory could not be allocated when growing the slice pool.
    ///
    /// Not retried internally; the caller decides whether to evict other
    /// resources and try again.
    #[error("device memory allocation failed: {size} bytes ({detail})")]
    AllocationFailed { size: u64, detail: String },

    /// The requested view format is not compatible with the buffer's
    /// usage flags.
    #[error("view format {format:?} incompatible with buffer usage {usage:?}")]
    IncompatibleViewFormat { format: Format, usage: BufferUsage },

    /// A view window falls outside its backing block or violates the
    /// format's alignment rules.
    #[error(
        "invalid view range: offset={offset} length={length} in a {backing}-byte backing: {detail}"
    )]
    InvalidViewRange { offset: u64, length: u64, backing: u64, detail: String },

    /// The device collaborator does not recognise the buffer handle.
    #[error("unknown buffer handle {0:?}")]
    UnknownBuffer(BufferHandle),

    /// Native view creation failed for a device-specific reason.
    #[error("native view creation failed: {0}")]
    ViewCreation(String),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, BufferError>;
