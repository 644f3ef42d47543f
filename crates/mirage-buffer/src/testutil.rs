//! Minimal in-memory device fakes shared by the unit tests.

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::device::{
    BufferCreateInfo, BufferUsage, BufferViewInfo, DeviceMemory, MemoryAllocator, MemoryFlags,
    NativeView, ViewFactory,
};
use crate::error::{BufferError, Result};
use crate::handle::{BufferHandle, MappedPtr, SliceHandle};

const BLOCK_ALIGN: usize = 256;

/// Aligned heap block posing as device memory.
#[derive(Debug)]
pub(crate) struct HeapMemory {
    handle: BufferHandle,
    ptr: Option<NonNull<u8>>,
    layout: Layout,
}

// SAFETY: the block is plain bytes owned by this value; callers that write
// through the mapped pointer provide their own exclusivity.
unsafe impl Send for HeapMemory {}
unsafe impl Sync for HeapMemory {}

impl DeviceMemory for HeapMemory {
    fn handle(&self) -> BufferHandle {
        self.handle
    }

    fn size(&self) -> u64 {
        self.layout.size() as u64
    }

    fn map_ptr(&self) -> MappedPtr {
        self.ptr.map_or(MappedPtr::NULL, |p| MappedPtr::new(p.as_ptr()))
    }
}

impl Drop for HeapMemory {
    fn drop(&mut self) {
        if let Some(p) = self.ptr.take() {
            // SAFETY: allocated with this layout in `TestAllocator`.
            unsafe { alloc::dealloc(p.as_ptr(), self.layout) };
        }
    }
}

/// Allocator fake: mints handles, counts calls, optionally enforces a
/// byte budget so allocation failure can be forced deterministically.
pub(crate) struct TestAllocator {
    next_handle: AtomicU64,
    calls: AtomicU64,
    budget: AtomicU64,
}

impl TestAllocator {
    pub(crate) fn new() -> Arc<Self> {
        Self::with_budget(u64::MAX)
    }

    pub(crate) fn with_budget(bytes: u64) -> Arc<Self> {
        Arc::new(Self {
            next_handle: AtomicU64::new(1),
            calls: AtomicU64::new(0),
            budget: AtomicU64::new(bytes),
        })
    }

    /// Number of `allocate_buffer` calls so far.
    pub(crate) fn allocations(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl MemoryAllocator for TestAllocator {
    fn allocate_buffer(
        &self,
        _info: &BufferCreateInfo,
        mem_flags: MemoryFlags,
        size: u64,
    ) -> Result<Box<dyn DeviceMemory>> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let remaining = self.budget.load(Ordering::Relaxed);
        if size > remaining {
            return Err(BufferError::AllocationFailed {
                size,
                detail: format!("budget exhausted, {remaining} bytes left"),
            });
        }
        self.budget.fetch_sub(size, Ordering::Relaxed);

        let layout = Layout::from_size_align(size as usize, BLOCK_ALIGN)
            .map_err(|e| BufferError::AllocationFailed { size, detail: e.to_string() })?;
        let ptr = if mem_flags.contains(MemoryFlags::HOST_VISIBLE) {
            // SAFETY: layout has non-zero size in every test.
            let raw = unsafe { alloc::alloc_zeroed(layout) };
            Some(NonNull::new(raw).ok_or(BufferError::AllocationFailed {
                size,
                detail: "host allocation returned null".into(),
            })?)
        } else {
            None
        };

        let handle = BufferHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        Ok(Box::new(HeapMemory { handle, ptr, layout }))
    }
}

/// View factory fake: mints view handles and counts create/destroy calls.
pub(crate) struct TestViewFactory {
    next_view: AtomicU64,
    created: AtomicU64,
    destroyed: AtomicU64,
    fail_creates: AtomicU64,
}

impl TestViewFactory {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            next_view: AtomicU64::new(1),
            created: AtomicU64::new(0),
            destroyed: AtomicU64::new(0),
            fail_creates: AtomicU64::new(0),
        })
    }

    /// Makes the next `n` `create_view` calls fail.
    pub(crate) fn fail_next(&self, n: u64) {
        self.fail_creates.store(n, Ordering::Relaxed);
    }

    pub(crate) fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub(crate) fn destroyed(&self) -> u64 {
        self.destroyed.load(Ordering::Relaxed)
    }

    /// Views created and not yet destroyed.
    pub(crate) fn live(&self) -> u64 {
        self.created() - self.destroyed()
    }
}

impl ViewFactory for TestViewFactory {
    fn create_view(&self, _slice: &SliceHandle, _info: &BufferViewInfo) -> Result<NativeView> {
        if self.fail_creates.load(Ordering::Relaxed) > 0 {
            self.fail_creates.fetch_sub(1, Ordering::Relaxed);
            return Err(BufferError::ViewCreation("forced failure".into()));
        }
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(NativeView(self.next_view.fetch_add(1, Ordering::Relaxed)))
    }

    fn destroy_view(&self, _view: NativeView) {
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Host-visible create info of `size` bytes with common usage flags.
pub(crate) fn create_info(size: u64) -> BufferCreateInfo {
    BufferCreateInfo { size, usage: BufferUsage::VERTEX | BufferUsage::UNIFORM_TEXEL }
}

pub(crate) fn host_flags() -> MemoryFlags {
    MemoryFlags::HOST_VISIBLE | MemoryFlags::HOST_COHERENT
}
