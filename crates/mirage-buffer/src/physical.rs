//! Physical buffers and the slices carved from them.
//!
//! A [`PhysicalBuffer`] is one native memory block owned by a virtual
//! buffer's pool, carved into equally sized slices. A [`PhysicalSlice`]
//! is one such carving; it keeps its block alive through an `Arc`, so a
//! block is released exactly when the last slice referring to it is gone.
//! The GPU use counter rides on the block: command submission acquires
//! it, retirement releases it, and the host polls it as a liveness hint.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::device::DeviceMemory;
use crate::handle::{BufferHandle, MappedPtr, SliceHandle};

// ── PhysicalBuffer ──────────────────────────────────────────────────────────

/// One native memory block plus its GPU use counter.
pub struct PhysicalBuffer {
    memory: Box<dyn DeviceMemory>,
    gpu_refs: AtomicU32,
}

impl PhysicalBuffer {
    pub(crate) fn new(memory: Box<dyn DeviceMemory>) -> Arc<Self> {
        Arc::new(Self { memory, gpu_refs: AtomicU32::new(0) })
    }

    /// Native handle of the block.
    pub fn handle(&self) -> BufferHandle {
        self.memory.handle()
    }

    /// Size of the block in bytes.
    pub fn size(&self) -> u64 {
        self.memory.size()
    }

    /// Host-mapped base address, null when not host-visible.
    pub fn map_ptr(&self) -> MappedPtr {
        self.memory.map_ptr()
    }

    /// Records one submitted command list that reads or writes the block.
    pub fn acquire(&self) {
        self.gpu_refs.fetch_add(1, Ordering::AcqRel);
    }

    /// Records the retirement of one previously acquired command list.
    pub fn release(&self) {
        let prev = self.gpu_refs.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "release without matching acquire");
    }

    /// Whether any submitted command list still uses the block.
    ///
    /// A polled hint: the answer may be stale by the time the caller acts
    /// on it, so it must only gate optimizations, never correctness.
    pub fn is_in_use(&self) -> bool {
        self.gpu_refs.load(Ordering::Acquire) != 0
    }
}

impl fmt::Debug for PhysicalBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalBuffer")
            .field("handle", &self.handle())
            .field("size", &self.size())
            .field("gpu_refs", &self.gpu_refs.load(Ordering::Relaxed))
            .finish()
    }
}

// ── PhysicalSlice ───────────────────────────────────────────────────────────

/// A byte range of one physical buffer.
///
/// `Clone` bumps the backing `Arc`; equality compares backing identity
/// and geometry.
#[derive(Clone)]
pub struct PhysicalSlice {
    buffer: Arc<PhysicalBuffer>,
    offset: u64,
    length: u64,
}

impl PhysicalSlice {
    pub(crate) fn new(buffer: Arc<PhysicalBuffer>, offset: u64, length: u64) -> Self {
        debug_assert!(offset + length <= buffer.size(), "slice outside its block");
        Self { buffer, offset, length }
    }

    /// Native handle of the backing block.
    pub fn handle(&self) -> BufferHandle {
        self.buffer.handle()
    }

    /// Byte offset within the backing block.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Byte length of the slice.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Host-mapped pointer `offset` bytes into the slice.
    pub fn map_ptr(&self, offset: u64) -> MappedPtr {
        self.buffer.map_ptr().byte_offset(self.offset + offset)
    }

    /// Narrows to a window given relative to this slice.
    #[must_use]
    pub fn sub_slice(&self, offset: u64, length: u64) -> Self {
        Self::new(Arc::clone(&self.buffer), self.offset + offset, length)
    }

    /// Backing block, for GPU use tracking.
    pub fn resource(&self) -> &Arc<PhysicalBuffer> {
        &self.buffer
    }

    /// Identity handle of the whole slice.
    pub fn slice_handle(&self) -> SliceHandle {
        self.slice_handle_at(0, self.length)
    }

    /// Identity handle of a window inside the slice.
    pub fn slice_handle_at(&self, offset: u64, length: u64) -> SliceHandle {
        SliceHandle {
            buffer: self.handle(),
            offset: self.offset + offset,
            length,
            map_ptr: self.map_ptr(offset),
        }
    }
}

impl PartialEq for PhysicalSlice {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
            && self.offset == other.offset
            && self.length == other.length
    }
}

impl Eq for PhysicalSlice {}

impl fmt::Debug for PhysicalSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalSlice")
            .field("buffer", &self.handle())
            .field("offset", &self.offset)
            .field("length", &self.length)
            .finish()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
