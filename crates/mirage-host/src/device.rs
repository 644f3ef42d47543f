//! The host device: aligned heap blocks behind the collaborator traits.

use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use mirage_buffer::{
    BufferCreateInfo, BufferError, BufferHandle, BufferUsage, BufferViewInfo, DeviceMemory,
    MappedPtr, MemoryAllocator, MemoryFlags, NativeView, Result, SLICE_ALIGNMENT, SliceHandle,
    ViewFactory,
};

/// Block base alignment. Matches the core's slice alignment so every
/// slice offset the core produces stays aligned in host memory.
const BLOCK_ALIGN: usize = SLICE_ALIGNMENT as usize;

// ── Stats ───────────────────────────────────────────────────────────────────

/// Counters exposed for diagnostics and test assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Bytes currently held by live blocks.
    pub allocated_bytes: u64,
    /// Blocks allocated so far.
    pub allocation_count: u64,
    /// Blocks freed so far.
    pub freed_count: u64,
    /// Native views created so far.
    pub views_created: u64,
    /// Native views destroyed so far.
    pub views_destroyed: u64,
}

impl DeviceStats {
    /// Views created and not yet destroyed.
    pub fn live_views(&self) -> u64 {
        self.views_created - self.views_destroyed
    }
}

// ── Device state ────────────────────────────────────────────────────────────

struct BlockInfo {
    usage: BufferUsage,
    size: u64,
}

struct Registry {
    /// Usage and size per live block, consulted by view validation.
    blocks: HashMap<BufferHandle, BlockInfo>,
    /// Bytes still available under the budget; freed blocks refund.
    remaining: u64,
    allocated_bytes: u64,
    allocation_count: u64,
    freed_count: u64,
}

struct DeviceState {
    next_handle: AtomicU64,
    next_view: AtomicU64,
    views_created: AtomicU64,
    views_destroyed: AtomicU64,
    registry: Mutex<Registry>,
}

// ── HostDevice ──────────────────────────────────────────────────────────────

/// An allocator and view factory over aligned host heap memory.
///
/// Blocks are zeroed at allocation and carry real mapped pointers when
/// requested host-visible, so renaming tests can write and read actual
/// bytes. The device is shared behind an `Arc` and handed to the core as
/// both collaborator capabilities.
pub struct HostDevice {
    state: Arc<DeviceState>,
}

impl HostDevice {
    /// A device with no allocation limit.
    pub fn new() -> Self {
        Self::with_budget(u64::MAX)
    }

    /// A device that fails any allocation pushing live bytes past
    /// `budget`, for deterministic out-of-memory tests.
    pub fn with_budget(budget: u64) -> Self {
        Self {
            state: Arc::new(DeviceState {
                next_handle: AtomicU64::new(1),
                next_view: AtomicU64::new(1),
                views_created: AtomicU64::new(0),
                views_destroyed: AtomicU64::new(0),
                registry: Mutex::new(Registry {
                    blocks: HashMap::new(),
                    remaining: budget,
                    allocated_bytes: 0,
                    allocation_count: 0,
                    freed_count: 0,
                }),
            }),
        }
    }

    /// Snapshot of the device counters.
    pub fn stats(&self) -> DeviceStats {
        let registry = self.state.registry.lock().expect("device registry lock poisoned");
        DeviceStats {
            allocated_bytes: registry.allocated_bytes,
            allocation_count: registry.allocation_count,
            freed_count: registry.freed_count,
            views_created: self.state.views_created.load(Ordering::Relaxed),
            views_destroyed: self.state.views_destroyed.load(Ordering::Relaxed),
        }
    }
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HostDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostDevice").field("stats", &self.stats()).finish()
    }
}

// ── Memory blocks ───────────────────────────────────────────────────────────

/// One aligned heap block posing as device memory.
struct HostMemory {
    handle: BufferHandle,
    ptr: NonNull<u8>,
    layout: Layout,
    mapped: bool,
    state: Arc<DeviceState>,
}

// SAFETY: the block is plain bytes owned by this value until drop.
// Writers synchronize through the renaming protocol, not through the
// block itself.
unsafe impl Send for HostMemory {}
unsafe impl Sync for HostMemory {}

impl DeviceMemory for HostMemory {
    fn handle(&self) -> BufferHandle {
        self.handle
    }

    fn size(&self) -> u64 {
        self.layout.size() as u64
    }

    fn map_ptr(&self) -> MappedPtr {
        if self.mapped { MappedPtr::new(self.ptr.as_ptr()) } else { MappedPtr::NULL }
    }
}

impl fmt::Debug for HostMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostMemory")
            .field("handle", &self.handle)
            .field("size", &self.layout.size())
            .field("mapped", &self.mapped)
            .finish()
    }
}

impl Drop for HostMemory {
    fn drop(&mut self) {
        // SAFETY: allocated with this layout in `allocate_buffer`.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };

        let size = self.layout.size() as u64;
        let mut registry = self.state.registry.lock().expect("device registry lock poisoned");
        registry.blocks.remove(&self.handle);
        registry.remaining = registry.remaining.saturating_add(size);
        registry.allocated_bytes -= size;
        registry.freed_count += 1;
    }
}

// ── Collaborator impls ──────────────────────────────────────────────────────

impl MemoryAllocator for HostDevice {
    fn allocate_buffer(
        &self,
        info: &BufferCreateInfo,
        mem_flags: MemoryFlags,
        size: u64,
    ) -> Result<Box<dyn DeviceMemory>> {
        if size == 0 {
            return Err(BufferError::AllocationFailed { size, detail: "zero-size block".into() });
        }
        let layout = Layout::from_size_align(size as usize, BLOCK_ALIGN)
            .map_err(|e| BufferError::AllocationFailed { size, detail: e.to_string() })?;

        // Debit the budget before touching the heap; refund on failure.
        {
            let mut registry = self.state.registry.lock().expect("device registry lock poisoned");
            if size > registry.remaining {
                return Err(BufferError::AllocationFailed {
                    size,
                    detail: format!("budget exhausted, {} bytes left", registry.remaining),
                });
            }
            registry.remaining -= size;
        }

        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            let mut registry = self.state.registry.lock().expect("device registry lock poisoned");
            registry.remaining = registry.remaining.saturating_add(size);
            return Err(BufferError::AllocationFailed {
                size,
                detail: "host allocation returned null".into(),
            });
        };

        let handle = BufferHandle(self.state.next_handle.fetch_add(1, Ordering::Relaxed));
        let mapped = mem_flags.contains(MemoryFlags::HOST_VISIBLE);

        let mut registry = self.state.registry.lock().expect("device registry lock poisoned");
        registry.blocks.insert(handle, BlockInfo { usage: info.usage, size });
        registry.allocated_bytes += size;
        registry.allocation_count += 1;
        drop(registry);

        debug!(%handle, size, mapped, "allocated host block");

        Ok(Box::new(HostMemory { handle, ptr, layout, mapped, state: Arc::clone(&self.state) }))
    }
}

impl ViewFactory for HostDevice {
    fn create_view(&self, slice: &SliceHandle, info: &BufferViewInfo) -> Result<NativeView> {
        let element = info.format.element_size();

        let registry = self.state.registry.lock().expect("device registry lock poisoned");
        let block = registry
            .blocks
            .get(&slice.buffer)
            .ok_or(BufferError::UnknownBuffer(slice.buffer))?;

        if !block.usage.intersects(BufferUsage::UNIFORM_TEXEL | BufferUsage::STORAGE_TEXEL) {
            return Err(BufferError::IncompatibleViewFormat {
                format: info.format,
                usage: block.usage,
            });
        }
        if slice.offset.checked_add(slice.length).is_none_or(|end| end > block.size) {
            return Err(BufferError::InvalidViewRange {
                offset: slice.offset,
                length: slice.length,
                backing: block.size,
                detail: "window extends past the backing block".into(),
            });
        }
        if !slice.offset.is_multiple_of(element) || !slice.length.is_multiple_of(element) {
            return Err(BufferError::InvalidViewRange {
                offset: slice.offset,
                length: slice.length,
                backing: block.size,
                detail: format!("window not aligned to {element}-byte elements"),
            });
        }
        drop(registry);

        self.state.views_created.fetch_add(1, Ordering::Relaxed);
        Ok(NativeView(self.state.next_view.fetch_add(1, Ordering::Relaxed)))
    }

    fn destroy_view(&self, _view: NativeView) {
        self.state.views_destroyed.fetch_add(1, Ordering::Relaxed);
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
