//! Identity types for physical buffer memory.
//!
//! A [`SliceHandle`] names a concrete byte range of device memory: native
//! buffer handle, offset, length, and the host-mapped pointer for that
//! range. Equality and hashing cover only the first three fields; the
//! mapped pointer is derived from them and carries no identity, which is
//! what lets a handle act as the key of a view cache.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;

// ── BufferHandle ────────────────────────────────────────────────────────────

/// Opaque handle of a native buffer object.
///
/// Minted by the memory allocator collaborator; the core never interprets
/// the value beyond equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferHandle(pub u64);

impl BufferHandle {
    /// The null handle, naming no buffer.
    pub const NULL: Self = Self(0);

    /// Whether this handle names no buffer.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{:#x}", self.0)
    }
}

// ── MappedPtr ───────────────────────────────────────────────────────────────

/// Host-mapped pointer into a physical buffer's memory.
///
/// Null when the backing memory is not host-visible. The wrapper carries
/// only an address; dereferencing goes through the unsafe accessors and is
/// governed by the renaming protocol: the host may only write through a
/// slice it holds exclusive access to.
#[derive(Clone, Copy)]
pub struct MappedPtr(Option<NonNull<u8>>);

impl MappedPtr {
    /// The null mapped pointer.
    pub const NULL: Self = Self(None);

    /// Wraps a raw pointer; null becomes [`MappedPtr::NULL`].
    #[must_use]
    pub fn new(ptr: *mut u8) -> Self {
        Self(NonNull::new(ptr))
    }

    /// Whether the memory is unmapped.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Raw pointer value; null if unmapped.
    #[must_use]
    pub fn as_ptr(&self) -> *mut u8 {
        self.0.map_or(std::ptr::null_mut(), NonNull::as_ptr)
    }

    /// Pointer advanced by `offset` bytes. Null stays null; the caller
    /// must keep the result inside the mapped allocation before
    /// dereferencing it.
    #[must_use]
    pub fn byte_offset(&self, offset: u64) -> Self {
        Self(self.0.and_then(|p| NonNull::new(p.as_ptr().wrapping_add(offset as usize))))
    }

    /// Copies `data` into the mapped region starting at `offset` bytes.
    ///
    /// # Panics
    /// Panics if the pointer is null.
    ///
    /// # Safety
    /// `offset + data.len()` must lie inside the mapped allocation and the
    /// caller must hold exclusive write access to that range.
    pub unsafe fn write_bytes(&self, offset: u64, data: &[u8]) {
        let base = self.as_ptr();
        assert!(!base.is_null(), "write through a null mapped pointer");
        // SAFETY: bounds and exclusivity are the caller's contract.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), base.add(offset as usize), data.len());
        }
    }

    /// Copies bytes out of the mapped region starting at `offset`.
    ///
    /// # Panics
    /// Panics if the pointer is null.
    ///
    /// # Safety
    /// `offset + out.len()` must lie inside the mapped allocation and no
    /// writer may touch that range concurrently.
    pub unsafe fn read_bytes(&self, offset: u64, out: &mut [u8]) {
        let base = self.as_ptr();
        assert!(!base.is_null(), "read through a null mapped pointer");
        // SAFETY: bounds and exclusivity are the caller's contract.
        unsafe {
            std::ptr::copy_nonoverlapping(base.add(offset as usize), out.as_mut_ptr(), out.len());
        }
    }
}

// SAFETY: MappedPtr is an address value. Every dereference is unsafe and
// carries its own aliasing contract, so moving the address between threads
// is sound.
unsafe impl Send for MappedPtr {}
unsafe impl Sync for MappedPtr {}

impl Default for MappedPtr {
    fn default() -> Self {
        Self::NULL
    }
}

impl PartialEq for MappedPtr {
    fn eq(&self, other: &Self) -> bool {
        self.as_ptr() == other.as_ptr()
    }
}

impl Eq for MappedPtr {}

impl fmt::Debug for MappedPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MappedPtr({:p})", self.as_ptr())
    }
}

// ── SliceHandle ─────────────────────────────────────────────────────────────

/// Identifies a concrete, currently valid byte range of device memory.
///
/// Equality and hashing are defined over `{buffer, offset, length}` only;
/// `map_ptr` is derived and does not participate. Immutable once built.
#[derive(Debug, Clone, Copy, Default)]
pub struct SliceHandle {
    /// Native handle of the physical buffer.
    pub buffer: BufferHandle,
    /// Byte offset of the slice within that buffer.
    pub offset: u64,
    /// Byte length of the slice.
    pub length: u64,
    /// Host-mapped pointer to the start of the slice, null if unmapped.
    pub map_ptr: MappedPtr,
}

impl PartialEq for SliceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.buffer == other.buffer && self.offset == other.offset && self.length == other.length
    }
}

impl Eq for SliceHandle {}

impl Hash for SliceHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.buffer.hash(state);
        self.offset.hash(state);
        self.length.hash(state);
    }
}

// ── DescriptorInfo ──────────────────────────────────────────────────────────

/// Descriptor-write payload naming the physical range a binding covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DescriptorInfo {
    /// Native handle of the physical buffer.
    pub buffer: BufferHandle,
    /// Byte offset of the bound range.
    pub offset: u64,
    /// Byte length of the bound range.
    pub range: u64,
}

// ── Tests ───────────────────────────────────────────────────────────────────
