//! The renaming virtual buffer.
//!
//! A [`VirtualBuffer`] gives one logical buffer a stable identity while
//! its physical backing rotates. A writer that must not disturb in-flight
//! GPU reads allocates a fresh slice, renames it in, writes through the
//! new mapped pointer, and hands the previous slice to a
//! [`BufferTracker`](crate::tracker::BufferTracker) for reclamation once
//! the submission epoch retires. Readers always resolve against the
//! current backing and never learn that a rename happened.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::device::{BufferCreateInfo, MemoryAllocator, MemoryFlags};
use crate::error::Result;
use crate::handle::{DescriptorInfo, MappedPtr, SliceHandle};
use crate::physical::{PhysicalBuffer, PhysicalSlice};
use crate::slice::BufferSlice;

/// Slice offsets within a backing block are aligned to this.
pub const SLICE_ALIGNMENT: u64 = 256;

/// Slices carved into the first backing block of a buffer.
const INITIAL_SLICE_COUNT: u64 = 2;

// ── Pool ────────────────────────────────────────────────────────────────────

/// Snapshot of the slice pool, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Slices ready for immediate handout.
    pub free_slices: usize,
    /// Reclaimed slices not yet recirculated.
    pub pending_slices: usize,
    /// Slices carved across all backing blocks.
    pub total_slices: u64,
    /// Backing blocks allocated, including the initial one.
    pub total_blocks: u64,
}

struct SlicePool {
    free: Vec<PhysicalSlice>,
    pending: Vec<PhysicalSlice>,
    /// Slices the next backing block will be carved into.
    next_slice_count: u64,
    total_slices: u64,
    total_blocks: u64,
}

// ── VirtualBuffer ───────────────────────────────────────────────────────────

/// One logical buffer backed by a rotating pool of physical slices.
///
/// All operations take `&self`; the buffer is shared behind an `Arc`.
/// Two independent critical sections keep writers and reclamation out of
/// each other's way: the pool lock serializes
/// [`alloc_physical_slice`](Self::alloc_physical_slice) and
/// [`free_physical_slice`](Self::free_physical_slice), the current-slice
/// lock serializes [`rename`](Self::rename) against reader snapshots.
/// Neither lock is ever held while the other is taken.
pub struct VirtualBuffer {
    info: BufferCreateInfo,
    mem_flags: MemoryFlags,
    allocator: Arc<dyn MemoryAllocator>,
    /// Byte length of every slice handed out, the logical buffer size.
    slice_length: u64,
    /// Spacing of slices within a backing block.
    slice_stride: u64,
    /// Transform feedback vertex stride, a binding-layer hint.
    vertex_stride: AtomicU32,
    pool: Mutex<SlicePool>,
    current: Mutex<PhysicalSlice>,
}

impl VirtualBuffer {
    /// Creates the buffer and its initial backing block.
    ///
    /// The block is carved into [`INITIAL_SLICE_COUNT`] slices; slice 0
    /// becomes the current backing and the rest seed the free pool.
    /// Allocation failure propagates to the caller.
    pub fn new(
        allocator: Arc<dyn MemoryAllocator>,
        info: BufferCreateInfo,
        mem_flags: MemoryFlags,
    ) -> Result<Self> {
        let slice_length = info.size;
        let slice_stride = info.size.next_multiple_of(SLICE_ALIGNMENT).max(SLICE_ALIGNMENT);
        let count = INITIAL_SLICE_COUNT;

        let memory = allocator.allocate_buffer(&info, mem_flags, count * slice_stride)?;
        let block = PhysicalBuffer::new(memory);

        let current = PhysicalSlice::new(Arc::clone(&block), 0, slice_length);
        let free = (1..count)
            .map(|i| PhysicalSlice::new(Arc::clone(&block), i * slice_stride, slice_length))
            .collect();

        debug!(
            block = %block.handle(),
            size = info.size,
            stride = slice_stride,
            slices = count,
            "created virtual buffer"
        );

        Ok(Self {
            info,
            mem_flags,
            allocator,
            slice_length,
            slice_stride,
            vertex_stride: AtomicU32::new(0),
            pool: Mutex::new(SlicePool {
                free,
                pending: Vec::new(),
                next_slice_count: count,
                total_slices: count,
                total_blocks: 1,
            }),
            current: Mutex::new(current),
        })
    }

    // ── Pool operations ─────────────────────────────────────────────────

    /// Hands out a slice of the buffer's length, backed by memory with
    /// the buffer's requested properties.
    ///
    /// Pops the free stack; when that is empty the pending stack is
    /// recirculated into it; when both are empty a new backing block is
    /// carved, sized for `next_slice_count` slices, and the count doubles
    /// for the block after it. Never blocks on GPU completion: only
    /// slices that already passed through
    /// [`free_physical_slice`](Self::free_physical_slice) are reused.
    pub fn alloc_physical_slice(&self) -> Result<PhysicalSlice> {
        let mut pool = self.pool.lock().expect("slice pool lock poisoned");

        if pool.free.is_empty() {
            // Recirculate everything reclaimed since the last drain.
            let SlicePool { free, pending, .. } = &mut *pool;
            std::mem::swap(free, pending);
        }

        if let Some(slice) = pool.free.pop() {
            return Ok(slice);
        }

        // Cold path: carve a new backing block. The pool lock stays held
        // so concurrent allocators do not both grow.
        let count = pool.next_slice_count;
        let memory =
            self.allocator.allocate_buffer(&self.info, self.mem_flags, count * self.slice_stride)?;
        let block = PhysicalBuffer::new(memory);

        pool.free.reserve(count as usize);
        for i in 1..count {
            pool.free.push(PhysicalSlice::new(
                Arc::clone(&block),
                i * self.slice_stride,
                self.slice_length,
            ));
        }
        pool.next_slice_count = count.saturating_mul(2);
        pool.total_slices += count;
        pool.total_blocks += 1;

        debug!(
            block = %block.handle(),
            slices = count,
            bytes = count * self.slice_stride,
            "grew slice pool"
        );

        Ok(PhysicalSlice::new(block, 0, self.slice_length))
    }

    /// Returns a slice to the pool for a future
    /// [`alloc_physical_slice`](Self::alloc_physical_slice).
    ///
    /// Must not be called while the GPU may still read the slice; callers
    /// funnel reclamation through a [`BufferTracker`] rather than calling
    /// this directly after a rename. Freeing the same slice twice is a
    /// contract violation and is not detected.
    ///
    /// [`BufferTracker`]: crate::tracker::BufferTracker
    pub fn free_physical_slice(&self, slice: PhysicalSlice) {
        debug_assert_eq!(slice.length(), self.slice_length, "slice from another buffer");
        let mut pool = self.pool.lock().expect("slice pool lock poisoned");
        pool.pending.push(slice);
    }

    /// Swaps the current backing for `next` and returns the previous one.
    ///
    /// Atomic with respect to every reader: a concurrent
    /// [`slice_handle`](Self::slice_handle) observes either the old or
    /// the new backing in full. The returned slice's contents may still
    /// be read by in-flight GPU work; hand it to a tracker.
    pub fn rename(&self, next: PhysicalSlice) -> PhysicalSlice {
        debug_assert_eq!(next.length(), self.slice_length, "slice from another buffer");
        let mut current = self.current.lock().expect("current slice lock poisoned");
        std::mem::replace(&mut *current, next)
    }

    // ── Reader snapshots ────────────────────────────────────────────────

    /// One self-consistent copy of the current backing.
    fn snapshot(&self) -> PhysicalSlice {
        self.current.lock().expect("current slice lock poisoned").clone()
    }

    /// Identity handle of the whole current backing.
    pub fn slice_handle(&self) -> SliceHandle {
        self.snapshot().slice_handle()
    }

    /// Identity handle of a window into the current backing.
    pub fn slice_handle_at(&self, offset: u64, length: u64) -> SliceHandle {
        self.snapshot().slice_handle_at(offset, length)
    }

    /// Host-mapped pointer `offset` bytes into the current backing.
    pub fn map_ptr(&self, offset: u64) -> MappedPtr {
        self.snapshot().map_ptr(offset)
    }

    /// Descriptor payload binding a window of the current backing.
    pub fn descriptor(&self, offset: u64, length: u64) -> DescriptorInfo {
        let current = self.snapshot();
        DescriptorInfo {
            buffer: current.handle(),
            offset: current.offset() + offset,
            range: length,
        }
    }

    /// Absolute byte offset of `offset` within the current backing's
    /// block, for dynamic descriptor binding.
    pub fn dynamic_offset(&self, offset: u64) -> u64 {
        self.snapshot().offset() + offset
    }

    /// Backing block of the current slice, for GPU use tracking.
    pub fn resource(&self) -> Arc<PhysicalBuffer> {
        Arc::clone(self.snapshot().resource())
    }

    /// Whether the current backing reports outstanding GPU references.
    ///
    /// A polled hint for callers deciding whether to rename rather than
    /// write in place.
    pub fn is_in_use(&self) -> bool {
        self.snapshot().resource().is_in_use()
    }

    // ── Slices ──────────────────────────────────────────────────────────

    /// A slice covering the whole buffer.
    pub fn slice(self: &Arc<Self>) -> BufferSlice {
        BufferSlice::new(Arc::clone(self))
    }

    /// A slice covering `offset..offset + length` of the buffer.
    pub fn sub_slice(self: &Arc<Self>, offset: u64, length: u64) -> BufferSlice {
        BufferSlice::with_range(Arc::clone(self), offset, length)
    }

    // ── Metadata ────────────────────────────────────────────────────────

    /// Creation parameters.
    pub fn info(&self) -> &BufferCreateInfo {
        &self.info
    }

    /// Memory properties of every backing block.
    pub fn mem_flags(&self) -> MemoryFlags {
        self.mem_flags
    }

    /// Transform feedback vertex stride.
    pub fn vertex_stride(&self) -> u32 {
        self.vertex_stride.load(Ordering::Relaxed)
    }

    /// Records the transform feedback vertex stride.
    pub fn set_vertex_stride(&self, stride: u32) {
        self.vertex_stride.store(stride, Ordering::Relaxed);
    }

    /// Snapshot of the slice pool.
    pub fn pool_stats(&self) -> PoolStats {
        let pool = self.pool.lock().expect("slice pool lock poisoned");
        PoolStats {
            free_slices: pool.free.len(),
            pending_slices: pool.pending.len(),
            total_slices: pool.total_slices,
            total_blocks: pool.total_blocks,
        }
    }
}

impl fmt::Debug for VirtualBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualBuffer")
            .field("info", &self.info)
            .field("mem_flags", &self.mem_flags)
            .field("slice_stride", &self.slice_stride)
            .finish_non_exhaustive()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
