//! Deferred reclamation of renamed-out slices.

use std::sync::Arc;

use tracing::debug;

use crate::buffer::VirtualBuffer;
use crate::physical::PhysicalSlice;

#[derive(Debug)]
struct Entry {
    buffer: Arc<VirtualBuffer>,
    slice: PhysicalSlice,
}

/// An epoch-scoped list of renamed-out slices awaiting reclamation.
///
/// A tracker bridges GPU-completion timing to CPU reclamation: renamed-out
/// slices are recorded here while the GPU may still read them, and
/// [`reset`](Self::reset) returns them to their buffers' pools once the
/// owning context knows the epoch's work has retired. The tracker itself
/// performs no synchronization and no waiting; one instance corresponds
/// to one in-flight submission epoch and is owned by one thread at a
/// time. A typical owner keeps a small ring of trackers and resets the
/// oldest once its epoch retires.
#[derive(Debug, Default)]
pub struct BufferTracker {
    entries: Vec<Entry>,
}

impl BufferTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `slice` for return to `buffer`'s pool at the next
    /// [`reset`](Self::reset).
    ///
    /// Call exactly once per renamed-out slice. Tracking the same slice
    /// twice becomes a double free at reset and is not detected.
    pub fn free_buffer_slice(&mut self, buffer: Arc<VirtualBuffer>, slice: PhysicalSlice) {
        self.entries.push(Entry { buffer, slice });
    }

    /// Returns every recorded slice to its buffer's pool and clears the
    /// list, keeping the allocation for the next epoch.
    ///
    /// The caller must know that all GPU work which could reference the
    /// recorded slices has completed.
    pub fn reset(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        debug!(slices = self.entries.len(), "returning epoch slices to their pools");
        for entry in self.entries.drain(..) {
            entry.buffer.free_physical_slice(entry.slice);
        }
    }

    /// Number of recorded reclamation entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{TestAllocator, create_info, host_flags};

    const SIZE: u64 = 128;

    fn buffer(alloc: &Arc<TestAllocator>) -> Arc<VirtualBuffer> {
        Arc::new(
            VirtualBuffer::new(alloc.clone(), create_info(SIZE), host_flags())
                .expect("create buffer"),
        )
    }

    #[test]
    fn tracked_slices_return_to_pool_on_reset() {
        let alloc = TestAllocator::new();
        let buf = buffer(&alloc);
        let mut tracker = BufferTracker::new();

        let fresh = buf.alloc_physical_slice().expect("alloc");
        let prev = buf.rename(fresh);
        tracker.free_buffer_slice(Arc::clone(&buf), prev);

        assert_eq!(tracker.len(), 1);
        assert_eq!(buf.pool_stats().pending_slices, 0);

        tracker.reset();
        assert!(tracker.is_empty());
        assert_eq!(buf.pool_stats().pending_slices, 1);
    }

    #[test]
    fn renamed_slice_is_not_reused_before_reset() {
        let alloc = TestAllocator::new();
        let buf = buffer(&alloc);
        let mut tracker = BufferTracker::new();

        let fresh = buf.alloc_physical_slice().expect("alloc");
        let prev = buf.rename(fresh);
        let prev_handle = prev.slice_handle();
        tracker.free_buffer_slice(Arc::clone(&buf), prev);

        // The pool is empty and the tracked slice must not come back,
        // so this allocation has to grow a new block.
        let unrelated = buf.alloc_physical_slice().expect("alloc");
        assert_ne!(unrelated.slice_handle(), prev_handle);
        assert_eq!(alloc.allocations(), 2);

        tracker.reset();

        // Drain the growth leftover, then the reclaimed slice reappears.
        let mut seen = Vec::new();
        seen.push(buf.alloc_physical_slice().expect("alloc").slice_handle());
        seen.push(buf.alloc_physical_slice().expect("alloc").slice_handle());
        assert!(seen.contains(&prev_handle));
        assert_eq!(alloc.allocations(), 2);
    }

    #[test]
    fn reset_returns_slices_to_their_own_buffers() {
        let alloc = TestAllocator::new();
        let buf_a = buffer(&alloc);
        let buf_b = buffer(&alloc);
        let mut tracker = BufferTracker::new();

        let prev_a = buf_a.rename(buf_a.alloc_physical_slice().expect("alloc a"));
        let prev_b = buf_b.rename(buf_b.alloc_physical_slice().expect("alloc b"));
        tracker.free_buffer_slice(Arc::clone(&buf_a), prev_a);
        tracker.free_buffer_slice(Arc::clone(&buf_b), prev_b);

        tracker.reset();
        assert_eq!(buf_a.pool_stats().pending_slices, 1);
        assert_eq!(buf_b.pool_stats().pending_slices, 1);
    }

    #[test]
    fn tracker_is_reusable_across_epochs() {
        let alloc = TestAllocator::new();
        let buf = buffer(&alloc);
        let mut tracker = BufferTracker::new();

        for _ in 0..3 {
            let prev = buf.rename(buf.alloc_physical_slice().expect("alloc"));
            tracker.free_buffer_slice(Arc::clone(&buf), prev);
            assert_eq!(tracker.len(), 1);
            tracker.reset();
            assert!(tracker.is_empty());
        }
        // Every epoch recycled the previous slice; the pool never grew.
        assert_eq!(alloc.allocations(), 1);
    }

    #[test]
    fn empty_reset_is_harmless() {
        let mut tracker = BufferTracker::new();
        tracker.reset();
        assert!(tracker.is_empty());
    }
}
