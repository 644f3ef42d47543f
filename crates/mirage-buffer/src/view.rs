//! Typed buffer views and their native-view cache.
//!
//! A [`BufferView`] binds one buffer to a fixed format and byte window.
//! Because the buffer's physical backing rotates under it, the native
//! view object must be re-derived whenever the backing changes; views are
//! cached by physical-slice identity so rotation among a bounded pool
//! reuses old native views instead of recreating them. Native view
//! creation is assumed to be expensive.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::buffer::VirtualBuffer;
use crate::device::{BufferCreateInfo, BufferViewInfo, NativeView, ViewFactory};
use crate::error::Result;
use crate::handle::SliceHandle;
use crate::physical::PhysicalBuffer;
use crate::slice::BufferSlice;

struct ViewState {
    /// Windowed handle the current native view was derived for.
    slice: SliceHandle,
    /// Native view valid for `slice`.
    view: NativeView,
    /// Every native view derived so far, keyed by slice identity.
    views: HashMap<SliceHandle, NativeView>,
}

/// A format-interpreted window into a [`VirtualBuffer`].
pub struct BufferView {
    factory: Arc<dyn ViewFactory>,
    buffer: Arc<VirtualBuffer>,
    info: BufferViewInfo,
    state: Mutex<ViewState>,
}

impl BufferView {
    /// Creates the view and derives an initial native view for the
    /// buffer's current backing.
    ///
    /// Fails when the format or window is incompatible with the buffer.
    pub fn new(
        factory: Arc<dyn ViewFactory>,
        buffer: Arc<VirtualBuffer>,
        info: BufferViewInfo,
    ) -> Result<Self> {
        let slice = buffer.slice_handle_at(info.range_offset, info.range_length);
        let view = factory.create_view(&slice, &info)?;
        let mut views = HashMap::new();
        views.insert(slice, view);

        Ok(Self { factory, buffer, info, state: Mutex::new(ViewState { slice, view, views }) })
    }

    /// Native view for the backing last seen by
    /// [`update_view`](Self::update_view).
    pub fn handle(&self) -> NativeView {
        self.state.lock().expect("view state lock poisoned").view
    }

    /// Windowed slice handle the current native view was derived for.
    pub fn slice_handle(&self) -> SliceHandle {
        self.state.lock().expect("view state lock poisoned").slice
    }

    /// Number of format elements the window covers.
    pub fn element_count(&self) -> u64 {
        self.info.range_length / self.info.format.element_size()
    }

    /// View parameters.
    pub fn info(&self) -> &BufferViewInfo {
        &self.info
    }

    /// The viewed buffer.
    pub fn buffer(&self) -> &Arc<VirtualBuffer> {
        &self.buffer
    }

    /// Creation parameters of the viewed buffer.
    pub fn buffer_info(&self) -> &BufferCreateInfo {
        self.buffer.info()
    }

    /// Backing block of the buffer's current physical slice.
    pub fn buffer_resource(&self) -> Arc<PhysicalBuffer> {
        self.buffer.resource()
    }

    /// The viewed window as a buffer slice.
    pub fn slice(&self) -> BufferSlice {
        self.buffer.sub_slice(self.info.range_offset, self.info.range_length)
    }

    /// Re-derives the native view if the buffer's backing rotated.
    ///
    /// The buffer's live windowed handle is compared against the last
    /// seen one; the mapped pointer does not participate. When it
    /// changed, a cached native view for the new handle is reused if one
    /// exists, otherwise a new one is created through the factory and
    /// cached. A creation failure leaves the previous view current and
    /// is retried on the next call. Concurrent calls serialize on the
    /// view state, so a slower update can never reinstall an older
    /// backing over one already published.
    pub fn update_view(&self) -> Result<()> {
        let mut state = self.state.lock().expect("view state lock poisoned");
        // The live handle must be sampled inside the critical section or
        // two racing updates could install out of order. The buffer's
        // slice lock nests inside the state lock, never the other way.
        let live = self.buffer.slice_handle_at(self.info.range_offset, self.info.range_length);
        if state.slice == live {
            return Ok(());
        }

        let view = match state.views.get(&live) {
            Some(&view) => view,
            None => {
                let view = self.factory.create_view(&live, &self.info)?;
                debug!(
                    buffer = %live.buffer,
                    offset = live.offset,
                    cached = state.views.len(),
                    "derived native view for rotated backing"
                );
                state.views.insert(live, view);
                view
            }
        };
        state.slice = live;
        state.view = view;
        Ok(())
    }
}

impl Drop for BufferView {
    fn drop(&mut self) {
        let state = self.state.get_mut().expect("view state lock poisoned");
        // The current view is always a cache entry, so this destroys
        // every native view exactly once.
        for (_, view) in state.views.drain() {
            self.factory.destroy_view(view);
        }
    }
}

impl fmt::Debug for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferView").field("info", &self.info).finish_non_exhaustive()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
