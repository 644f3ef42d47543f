//! Device collaborator seams.
//!
//! The core never talks to a device API directly. It is handed two
//! capabilities at construction time: a [`MemoryAllocator`] that carves
//! native buffer memory for the slice pool, and a [`ViewFactory`] that
//! creates and destroys typed views over physical slices. Both are object
//! safe so a device backend can be injected as `Arc<dyn _>`.

use std::fmt;

use bitflags::bitflags;

use crate::error::Result;
use crate::format::Format;
use crate::handle::{BufferHandle, MappedPtr, SliceHandle};

// ── Creation descriptors ────────────────────────────────────────────────────

bitflags! {
    /// Pipeline bind points a buffer must support.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC       = 1 << 0;
        const TRANSFER_DST       = 1 << 1;
        const UNIFORM_TEXEL      = 1 << 2;
        const STORAGE_TEXEL      = 1 << 3;
        const UNIFORM            = 1 << 4;
        const STORAGE            = 1 << 5;
        const INDEX              = 1 << 6;
        const VERTEX             = 1 << 7;
        const INDIRECT           = 1 << 8;
        const TRANSFORM_FEEDBACK = 1 << 9;
    }
}

bitflags! {
    /// Properties of the memory type backing a buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryFlags: u32 {
        const DEVICE_LOCAL  = 1 << 0;
        const HOST_VISIBLE  = 1 << 1;
        const HOST_COHERENT = 1 << 2;
        const HOST_CACHED   = 1 << 3;
    }
}

/// Creation parameters of a virtual buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCreateInfo {
    /// Logical size of the buffer in bytes.
    pub size: u64,
    /// Bind points the buffer and all its backings must support.
    pub usage: BufferUsage,
}

impl Default for BufferCreateInfo {
    fn default() -> Self {
        Self { size: 0, usage: BufferUsage::empty() }
    }
}

// ── Memory allocation ───────────────────────────────────────────────────────

/// One native memory block backing a run of physical slices.
///
/// Dropping the value releases the native allocation. The core keeps a
/// block alive exactly as long as some physical slice still refers to it.
pub trait DeviceMemory: fmt::Debug + Send + Sync {
    /// Native handle of the block.
    fn handle(&self) -> BufferHandle;

    /// Size of the block in bytes.
    fn size(&self) -> u64;

    /// Host-mapped base address, null when the memory is not host-visible.
    fn map_ptr(&self) -> MappedPtr;
}

/// Allocates native buffer memory for the slice pool.
pub trait MemoryAllocator: Send + Sync {
    /// Allocates one block of `size` bytes usable as `info.usage` in
    /// memory with `mem_flags` properties.
    ///
    /// Out of memory is a recoverable error, never a panic.
    fn allocate_buffer(
        &self,
        info: &BufferCreateInfo,
        mem_flags: MemoryFlags,
        size: u64,
    ) -> Result<Box<dyn DeviceMemory>>;
}

// ── Typed views ─────────────────────────────────────────────────────────────

/// Opaque handle of a native typed buffer view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeView(pub u64);

/// Typed-view parameters: a format and a byte window into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferViewInfo {
    /// Texel format the view reinterprets the window with.
    pub format: Format,
    /// Byte offset of the window within the virtual buffer.
    pub range_offset: u64,
    /// Byte length of the window.
    pub range_length: u64,
}

/// Creates and destroys native typed views over physical slices.
pub trait ViewFactory: Send + Sync {
    /// Creates a native view of `info.format` covering exactly the
    /// window named by `slice`. `info` carries the logical window the
    /// caller already resolved into `slice`.
    ///
    /// Fails when the format is incompatible with the buffer's usage or
    /// the window violates the format's alignment rules.
    fn create_view(&self, slice: &SliceHandle, info: &BufferViewInfo) -> Result<NativeView>;

    /// Destroys a view previously created by this factory.
    fn destroy_view(&self, view: NativeView);
}
