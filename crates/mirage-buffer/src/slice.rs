//! Lightweight windows into a virtual buffer.
//!
//! A [`BufferSlice`] names an offset and length within a
//! [`VirtualBuffer`] and forwards every query to the owning buffer,
//! resolved against whatever physical slice is current at call time. A
//! default-constructed slice is "undefined" and answers every query with
//! a null or zero value instead of failing, so the type stays safe to
//! pass around before it is bound.

use std::fmt;
use std::sync::Arc;

use crate::buffer::VirtualBuffer;
use crate::device::BufferCreateInfo;
use crate::handle::{DescriptorInfo, MappedPtr, SliceHandle};
use crate::physical::PhysicalBuffer;

/// A cheap, copyable window into a [`VirtualBuffer`].
#[derive(Clone, Default)]
pub struct BufferSlice {
    buffer: Option<Arc<VirtualBuffer>>,
    offset: u64,
    length: u64,
}

impl BufferSlice {
    /// A slice covering all of `buffer`.
    pub fn new(buffer: Arc<VirtualBuffer>) -> Self {
        let length = buffer.info().size;
        Self { buffer: Some(buffer), offset: 0, length }
    }

    /// A slice covering `offset..offset + length` of `buffer`.
    ///
    /// The window is not bounds-checked; the buffer enforces nothing
    /// beyond what its collaborators enforce downstream.
    pub fn with_range(buffer: Arc<VirtualBuffer>, offset: u64, length: u64) -> Self {
        Self { buffer: Some(buffer), offset, length }
    }

    /// Whether the slice is bound to a buffer.
    pub fn defined(&self) -> bool {
        self.buffer.is_some()
    }

    /// Byte offset of the window within the buffer.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Byte length of the window.
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The bound buffer, if any.
    pub fn buffer(&self) -> Option<&Arc<VirtualBuffer>> {
        self.buffer.as_ref()
    }

    /// Creation parameters of the bound buffer.
    pub fn buffer_info(&self) -> Option<&BufferCreateInfo> {
        self.buffer.as_deref().map(VirtualBuffer::info)
    }

    /// A narrower window relative to this one, over the same buffer.
    #[must_use]
    pub fn sub_slice(&self, offset: u64, length: u64) -> Self {
        Self { buffer: self.buffer.clone(), offset: self.offset + offset, length }
    }

    /// Identity handle of the window within the current backing.
    pub fn slice_handle(&self) -> SliceHandle {
        match &self.buffer {
            Some(buffer) => buffer.slice_handle_at(self.offset, self.length),
            None => SliceHandle::default(),
        }
    }

    /// Identity handle of a window within this window.
    pub fn slice_handle_at(&self, offset: u64, length: u64) -> SliceHandle {
        match &self.buffer {
            Some(buffer) => buffer.slice_handle_at(self.offset + offset, length),
            None => SliceHandle::default(),
        }
    }

    /// Host-mapped pointer `offset` bytes into the window.
    pub fn map_ptr(&self, offset: u64) -> MappedPtr {
        match &self.buffer {
            Some(buffer) => buffer.map_ptr(self.offset + offset),
            None => MappedPtr::NULL,
        }
    }

    /// Descriptor payload for binding the window.
    pub fn descriptor(&self) -> DescriptorInfo {
        match &self.buffer {
            Some(buffer) => buffer.descriptor(self.offset, self.length),
            None => DescriptorInfo::default(),
        }
    }

    /// Dynamic descriptor offset of the window.
    pub fn dynamic_offset(&self) -> u64 {
        match &self.buffer {
            Some(buffer) => buffer.dynamic_offset(self.offset),
            None => 0,
        }
    }

    /// Backing block of the buffer's current physical slice.
    pub fn resource(&self) -> Option<Arc<PhysicalBuffer>> {
        self.buffer.as_deref().map(VirtualBuffer::resource)
    }

    /// Whether both slices name the same buffer and the same window.
    ///
    /// Identity plus geometry, never content equality. Two undefined
    /// slices match.
    pub fn matches(&self, other: &Self) -> bool {
        let same_buffer = match (&self.buffer, &other.buffer) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_buffer && self.offset == other.offset && self.length == other.length
    }
}

impl PartialEq for BufferSlice {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for BufferSlice {}

impl fmt::Debug for BufferSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferSlice")
            .field("defined", &self.defined())
            .field("offset", &self.offset)
            .field("length", &self.length)
            .finish()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
