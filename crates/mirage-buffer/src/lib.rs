//! Renaming buffer allocator and dependent view cache for GPU-resident
//! linear memory.
//!
//! A [`VirtualBuffer`] gives one logical buffer a stable identity while
//! rotating its physical backing, so host writers never stall on
//! in-flight GPU readers. [`BufferSlice`] and [`BufferView`] resolve
//! against the current backing at call time; a [`BufferTracker`] carries
//! renamed-out slices across the GPU-completion boundary and returns
//! them to their pools once the submission epoch retires. Device memory
//! and native view creation are injected capabilities, so the crate runs
//! against any backend implementing [`MemoryAllocator`] and
//! [`ViewFactory`].

pub mod buffer;
pub mod device;
pub mod error;
pub mod format;
pub mod handle;
pub mod physical;
pub mod slice;
pub mod tracker;
pub mod view;

#[cfg(test)]
pub(crate) mod testutil;

pub use buffer::{PoolStats, SLICE_ALIGNMENT, VirtualBuffer};
pub use device::{
    BufferCreateInfo, BufferUsage, BufferViewInfo, DeviceMemory, MemoryAllocator, MemoryFlags,
    NativeView, ViewFactory,
};
pub use error::{BufferError, Result};
pub use format::Format;
pub use handle::{BufferHandle, DescriptorInfo, MappedPtr, SliceHandle};
pub use physical::{PhysicalBuffer, PhysicalSlice};
pub use slice::BufferSlice;
pub use tracker::BufferTracker;
pub use view::BufferView;
