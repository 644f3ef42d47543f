//! Host-memory reference device for the renaming buffer core.
//!
//! [`HostDevice`] implements the buffer core's two collaborator seams,
//! [`MemoryAllocator`](mirage_buffer::MemoryAllocator) and
//! [`ViewFactory`](mirage_buffer::ViewFactory), over plain aligned heap
//! memory. Mapped pointers are real and writable, so the full renaming
//! protocol can be exercised and observed without a GPU: tests write
//! through renamed-in slices, read renamed-out ones, force allocation
//! failure with a byte budget, and verify the view cache against live
//! view counters.

pub mod device;

pub use device::{DeviceStats, HostDevice};
