//! Render-thread state
//!
//! Everything that only the render thread may touch lives in [`RenderThread`]. It is
//! deliberately `!Send` and `!Sync`; render-thread entry points take it by reference.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::functor::FunctorId;
use crate::surface::{CanvasContext, GpuContext, SurfaceComposer};

pub struct RenderThread {
    composer: Rc<dyn SurfaceComposer>,
    active_context: RefCell<Option<Rc<dyn CanvasContext>>>,
    gpu_context: Option<Rc<dyn GpuContext>>,
    /// Functor whose callback is currently running, if any
    current_functor: Cell<Option<FunctorId>>,
}

impl RenderThread {
    pub fn new(composer: Rc<dyn SurfaceComposer>) -> Self {
        RenderThread {
            composer,
            active_context: RefCell::new(None),
            gpu_context: None,
            current_functor: Cell::new(None),
        }
    }

    /// Attach the GPU context reset after functor context teardown.
    pub fn with_gpu_context(mut self, gpu_context: Rc<dyn GpuContext>) -> Self {
        self.gpu_context = Some(gpu_context);
        self
    }

    /// Make `context` the one frames are currently drawn into, or clear it.
    pub fn set_active_context(&self, context: Option<Rc<dyn CanvasContext>>) {
        *self.active_context.borrow_mut() = context;
    }

    pub fn active_context(&self) -> Option<Rc<dyn CanvasContext>> {
        self.active_context.borrow().clone()
    }

    pub fn composer(&self) -> &dyn SurfaceComposer {
        self.composer.as_ref()
    }

    /// May be absent, e.g. before the first frame or in unit tests.
    pub fn gpu_context(&self) -> Option<&dyn GpuContext> {
        self.gpu_context.as_deref()
    }

    pub fn current_functor(&self) -> Option<FunctorId> {
        self.current_functor.get()
    }

    /// Claim the current-functor slot for `functor` until the guard drops.
    pub(crate) fn enter_functor(&self, functor: FunctorId) -> CurrentFunctorSlot<'_> {
        if let Some(current) = self.current_functor.get() {
            panic!("nested functor draw: {:?} entered while {:?} is current", functor, current);
        }
        self.current_functor.set(Some(functor));
        CurrentFunctorSlot { render_thread: self }
    }
}

/// Holds the current-functor slot; clears it on drop
pub(crate) struct CurrentFunctorSlot<'a> {
    render_thread: &'a RenderThread,
}

impl Drop for CurrentFunctorSlot<'_> {
    fn drop(&mut self) {
        debug_assert!(self.render_thread.current_functor.get().is_some());
        self.render_thread.current_functor.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeComposer;

    #[test]
    fn test_slot_is_cleared_on_drop() {
        let rt = RenderThread::new(Rc::new(FakeComposer::default()));
        {
            let _slot = rt.enter_functor(FunctorId::from_raw(3));
            assert_eq!(rt.current_functor(), Some(FunctorId::from_raw(3)));
        }
        assert_eq!(rt.current_functor(), None);

        // The slot can be claimed again once released
        let _slot = rt.enter_functor(FunctorId::from_raw(4));
        assert_eq!(rt.current_functor(), Some(FunctorId::from_raw(4)));
    }

    #[test]
    #[should_panic(expected = "nested functor draw")]
    fn test_nested_entry_is_fatal() {
        let rt = RenderThread::new(Rc::new(FakeComposer::default()));
        let _outer = rt.enter_functor(FunctorId::from_raw(1));
        let _inner = rt.enter_functor(FunctorId::from_raw(2));
    }

    #[test]
    fn test_active_context_can_be_cleared() {
        let rt = RenderThread::new(Rc::new(FakeComposer::default()));
        assert!(rt.active_context().is_none());
        assert!(rt.gpu_context().is_none());
    }
}
