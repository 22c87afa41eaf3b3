//! WebView functors
//!
//! A functor is one embedder-supplied callback bundle plus the render state needed to
//! invoke it safely: whether a GPU context was created, the overlay surface attached
//! to it, and the threads the embedder renders it on.
//!
//! Callbacks run on the render thread while the functor is the "current" one. The
//! overlay accessors handed to the embedder receive an explicit token pointing at
//! that [`CurrentFunctor`] scope, so no ambient per-thread state is involved.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use libc::{c_int, c_void, pid_t};
use log::{debug, trace};
use parking_lot::{Mutex, MutexGuard};

use crate::ffi::*;
use crate::render_thread::{CurrentFunctorSlot, RenderThread};
use crate::surface::{NativeTransaction, SurfaceControl, Transaction, OVERLAY_SURFACE_NAME};

/// Process-unique functor identifier handed to the embedder
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctorId(c_int);

impl FunctorId {
    #[inline]
    pub const fn from_raw(raw: c_int) -> Self {
        FunctorId(raw)
    }

    #[inline]
    pub const fn as_raw(self) -> c_int {
        self.0
    }
}

impl fmt::Display for FunctorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render-thread state of a functor
struct RenderState {
    has_context: bool,
    surface_control: Option<SurfaceControl>,
    /// Generation of the root surface the overlay was last parented to
    parent_surface_control_generation_id: i32,
}

pub struct WebViewFunctor {
    id: FunctorId,
    data: *mut c_void,
    callbacks: WebViewFunctorCallbacks,
    mode: RenderMode,
    overlays_enabled: bool,
    handle_created: AtomicBool,
    handle_dropped: AtomicBool,
    state: Mutex<RenderState>,
    rendering_threads: Mutex<Vec<pid_t>>,
}

// `data` is never dereferenced here, only passed back to the embedder's callbacks,
// which are required to accept calls from the render thread.
unsafe impl Send for WebViewFunctor {}
unsafe impl Sync for WebViewFunctor {}

impl fmt::Debug for WebViewFunctor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebViewFunctor")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl WebViewFunctor {
    pub fn new(
        id: FunctorId,
        data: *mut c_void,
        callbacks: WebViewFunctorCallbacks,
        mode: RenderMode,
        overlays_enabled: bool,
    ) -> Self {
        WebViewFunctor {
            id,
            data,
            callbacks,
            mode,
            overlays_enabled,
            handle_created: AtomicBool::new(false),
            handle_dropped: AtomicBool::new(false),
            state: Mutex::new(RenderState {
                has_context: false,
                surface_control: None,
                parent_surface_control_generation_id: 0,
            }),
            rendering_threads: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn id(&self) -> FunctorId {
        self.id
    }

    #[inline]
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Create the one handle this functor will ever have. Dropping the handle posts
    /// the functor id onto `destroy_queue`.
    pub fn create_handle(self: &Arc<Self>, destroy_queue: Sender<FunctorId>) -> FunctorHandle {
        assert!(
            !self.handle_created.swap(true, Ordering::SeqCst),
            "handle already created for functor {}",
            self.id
        );
        FunctorHandle {
            functor: Arc::clone(self),
            destroy_queue,
        }
    }

    /// True while the functor's handle exists. The functor must not be torn down
    /// until it is gone.
    pub(crate) fn has_live_handle(&self) -> bool {
        self.handle_created.load(Ordering::SeqCst) && !self.handle_dropped.load(Ordering::SeqCst)
    }

    /// The render-state accessors below must not be called from this functor's own
    /// callbacks: the state lock is held for the duration of every draw.
    pub fn has_context(&self) -> bool {
        self.state.lock().has_context
    }

    /// Overlay surface currently attached to this functor
    pub fn surface_control(&self) -> Option<SurfaceControl> {
        self.state.lock().surface_control
    }

    pub fn parent_surface_control_generation_id(&self) -> i32 {
        self.state.lock().parent_surface_control_generation_id
    }

    pub fn sync(&self, sync_data: &WebViewSyncData) {
        trace!("WebViewFunctor::sync {}", self.id);
        if let Some(on_sync) = self.callbacks.on_sync {
            unsafe { on_sync(self.id.as_raw(), self.data, sync_data) };
        }
    }

    pub fn draw_gl(&self, render_thread: &RenderThread, draw_info: &DrawGlInfo) {
        trace!("WebViewFunctor::drawGl {}", self.id);
        let Some(draw) = self.callbacks.gles.draw else {
            panic!("gles.draw is null for functor {}", self.id);
        };

        let mut current = CurrentFunctor::enter(self, render_thread);
        current.state.has_context = true;

        let mut overlays_mode = OverlaysMode::Disabled;
        if !draw_info.is_layer && current.prepare_root_surface_control() {
            overlays_mode = OverlaysMode::Enabled;
        }
        let overlay = current.overlay_data(overlays_mode);

        unsafe { draw(self.id.as_raw(), self.data, draw_info, &overlay) };
    }

    /// Initialize the Vulkan side once; later calls are ignored until the context is
    /// destroyed.
    pub fn init_vk(&self, params: &VkFunctorInitParams) {
        trace!("WebViewFunctor::initVk {}", self.id);
        {
            let mut state = self.state.lock();
            if state.has_context {
                return;
            }
            state.has_context = true;
        }

        let Some(initialize) = self.callbacks.vk.initialize else {
            panic!("vk.initialize is null for functor {}", self.id);
        };
        unsafe { initialize(self.id.as_raw(), self.data, params) };
    }

    pub fn draw_vk(&self, render_thread: &RenderThread, params: &VkFunctorDrawParams) {
        trace!("WebViewFunctor::drawVk {}", self.id);
        let Some(draw) = self.callbacks.vk.draw else {
            panic!("vk.draw is null for functor {}", self.id);
        };

        let mut current = CurrentFunctor::enter(self, render_thread);

        let mut overlays_mode = OverlaysMode::Disabled;
        if !params.is_layer && current.prepare_root_surface_control() {
            overlays_mode = OverlaysMode::Enabled;
        }
        let overlay = current.overlay_data(overlays_mode);

        unsafe { draw(self.id.as_raw(), self.data, params, &overlay) };
    }

    pub fn post_draw_vk(&self) {
        trace!("WebViewFunctor::postDrawVk {}", self.id);
        let Some(post_draw) = self.callbacks.vk.post_draw else {
            panic!("vk.post_draw is null for functor {}", self.id);
        };
        unsafe { post_draw(self.id.as_raw(), self.data) };
    }

    /// Tear down the embedder's GPU context if one was created. Idempotent.
    pub fn destroy_context(&self, render_thread: &RenderThread) {
        self.assert_not_current(render_thread, "destroy_context");
        let had_context = std::mem::replace(&mut self.state.lock().has_context, false);
        if !had_context {
            return;
        }

        debug!("WebViewFunctor::onContextDestroyed {}", self.id);
        if let Some(on_context_destroyed) = self.callbacks.on_context_destroyed {
            unsafe { on_context_destroyed(self.id.as_raw(), self.data) };
        }

        if let Some(gpu_context) = render_thread.gpu_context() {
            gpu_context.reset_context();
        }
    }

    pub fn remove_overlays(&self, render_thread: &RenderThread) {
        let mut current = CurrentFunctor::enter(self, render_thread);
        current.remove_overlays();
    }

    pub fn on_removed_from_tree(&self, render_thread: &RenderThread) {
        trace!("WebViewFunctor::onRemovedFromTree {}", self.id);
        self.assert_not_current(render_thread, "on_removed_from_tree");
        if self.surface_control().is_some() {
            self.remove_overlays(render_thread);
        }
    }

    fn assert_not_current(&self, render_thread: &RenderThread, operation: &str) {
        if render_thread.current_functor() == Some(self.id) {
            panic!("{} re-entered from a callback of functor {}", operation, self.id);
        }
    }

    /// Replace the set of threads the embedder renders this functor on.
    pub fn report_rendering_threads(&self, thread_ids: &[pid_t]) {
        *self.rendering_threads.lock() = thread_ids.to_vec();
    }

    pub fn rendering_threads(&self) -> Vec<pid_t> {
        self.rendering_threads.lock().clone()
    }

    /// Final teardown, run on the render thread once the functor left the registry.
    pub(crate) fn destroy(&self, render_thread: &RenderThread) {
        self.destroy_context(render_thread);

        debug!("WebViewFunctor::onDestroy {}", self.id);
        if self.surface_control().is_some() {
            self.remove_overlays(render_thread);
        }
        if let Some(on_destroyed) = self.callbacks.on_destroyed {
            unsafe { on_destroyed(self.id.as_raw(), self.data) };
        }
    }
}

/// The functor being invoked on the render thread.
///
/// Holds the render-thread current-functor slot and the functor's render state for
/// as long as an embedder callback may call back into the overlay accessors.
///
/// The state lock is not reentrant. A callback touching its own functor goes
/// through the token accessors; `destroy_context` and `on_removed_from_tree` check
/// the slot and panic instead of deadlocking.
struct CurrentFunctor<'a> {
    functor: &'a WebViewFunctor,
    render_thread: &'a RenderThread,
    state: MutexGuard<'a, RenderState>,
    _slot: CurrentFunctorSlot<'a>,
}

impl<'a> CurrentFunctor<'a> {
    fn enter(functor: &'a WebViewFunctor, render_thread: &'a RenderThread) -> Self {
        let slot = render_thread.enter_functor(functor.id);
        CurrentFunctor {
            functor,
            render_thread,
            state: functor.state.lock(),
            _slot: slot,
        }
    }

    fn token(&mut self) -> *mut c_void {
        (self as *mut Self).cast()
    }

    fn overlay_data(&mut self, overlays_mode: OverlaysMode) -> WebViewOverlayData {
        WebViewOverlayData {
            overlays_mode,
            token: self.token(),
            get_surface_control: current_get_surface_control,
            merge_transaction: current_merge_transaction,
        }
    }

    /// Make sure the overlay hangs off the current root surface. Returns `false` when
    /// overlays can't be offered for this draw.
    fn prepare_root_surface_control(&mut self) -> bool {
        if !self.functor.overlays_enabled {
            return false;
        }

        let Some(active_context) = self.render_thread.active_context() else {
            return false;
        };
        let Some(root_surface_control) = active_context.surface_control() else {
            return false;
        };

        let generation_id = active_context.surface_control_generation_id();
        if self.state.parent_surface_control_generation_id != generation_id {
            self.reparent_surface_control(Some(root_surface_control));
            self.state.parent_surface_control_generation_id = generation_id;
        }

        true
    }

    /// Overlay surface for the embedder, created under the root surface on first use.
    fn surface_control(&mut self) -> SurfaceControl {
        if let Some(surface_control) = self.state.surface_control {
            return surface_control;
        }

        let Some(active_context) = self.render_thread.active_context() else {
            panic!("Null active canvas context!");
        };
        let Some(root_surface_control) = active_context.surface_control() else {
            panic!("Null root surface control!");
        };

        self.state.parent_surface_control_generation_id =
            active_context.surface_control_generation_id();

        let composer = self.render_thread.composer();
        let surface_control = composer.create_surface(OVERLAY_SURFACE_NAME, root_surface_control);
        self.state.surface_control = Some(surface_control);
        debug!("Created overlay surface for functor {}", self.functor.id);

        active_context.prepare_surface_control_for_webview();
        composer.apply(
            Transaction::new()
                .set_layer(surface_control, -1)
                .show(surface_control),
        );
        surface_control
    }

    fn merge_transaction(&mut self, transaction: Transaction) {
        if transaction.is_empty() {
            return;
        }

        // No active context when invoked from removeOverlays during teardown
        let done = self
            .render_thread
            .active_context()
            .map(|context| context.merge_transaction(&transaction, self.state.surface_control))
            .unwrap_or(false);
        if !done {
            self.render_thread.composer().apply(transaction);
        }
    }

    fn reparent_surface_control(&mut self, parent: Option<SurfaceControl>) {
        let Some(surface_control) = self.state.surface_control else {
            return;
        };
        self.merge_transaction(Transaction::new().reparent(surface_control, parent));
    }

    fn remove_overlays(&mut self) {
        let functor = self.functor;
        if let Some(remove_overlays) = functor.callbacks.remove_overlays {
            let token = self.token();
            unsafe {
                remove_overlays(functor.id.as_raw(), functor.data, token, current_merge_transaction)
            };
        }

        if self.state.surface_control.is_some() {
            self.reparent_surface_control(None);
            self.state.surface_control = None;
        }
    }
}

unsafe extern "C" fn current_get_surface_control(token: *mut c_void) -> *mut ASurfaceControl {
    assert!(!token.is_null(), "getSurfaceControl called without a current functor");
    let current = &mut *token.cast::<CurrentFunctor<'_>>();
    current.surface_control().as_ptr()
}

unsafe extern "C" fn current_merge_transaction(token: *mut c_void, transaction: *mut ASurfaceTransaction) {
    assert!(!token.is_null(), "mergeTransaction called without a current functor");
    let Some(native) = NativeTransaction::from_raw(transaction) else {
        return;
    };
    let current = &mut *token.cast::<CurrentFunctor<'_>>();
    current.merge_transaction(Transaction::from_native(native));
}

/// Sole owner-side reference to a functor.
///
/// Handles are move-only; the registry shares one through an `Arc`. When the last
/// reference goes away the functor id is queued for destruction on the render
/// thread, never destroyed inline.
#[derive(Debug)]
pub struct FunctorHandle {
    functor: Arc<WebViewFunctor>,
    destroy_queue: Sender<FunctorId>,
}

impl FunctorHandle {
    #[inline]
    pub fn id(&self) -> FunctorId {
        self.functor.id()
    }

    pub fn functor(&self) -> &WebViewFunctor {
        &self.functor
    }

    pub fn sync(&self, sync_data: &WebViewSyncData) {
        self.functor.sync(sync_data);
    }

    pub fn draw_gl(&self, render_thread: &RenderThread, draw_info: &DrawGlInfo) {
        self.functor.draw_gl(render_thread, draw_info);
    }

    pub fn init_vk(&self, params: &VkFunctorInitParams) {
        self.functor.init_vk(params);
    }

    pub fn draw_vk(&self, render_thread: &RenderThread, params: &VkFunctorDrawParams) {
        self.functor.draw_vk(render_thread, params);
    }

    pub fn post_draw_vk(&self) {
        self.functor.post_draw_vk();
    }

    pub fn remove_overlays(&self, render_thread: &RenderThread) {
        self.functor.remove_overlays(render_thread);
    }

    pub fn on_removed_from_tree(&self, render_thread: &RenderThread) {
        self.functor.on_removed_from_tree(render_thread);
    }

    pub fn rendering_threads(&self) -> Vec<pid_t> {
        self.functor.rendering_threads()
    }
}

impl Drop for FunctorHandle {
    fn drop(&mut self) {
        let id = self.functor.id();
        self.functor.handle_dropped.store(true, Ordering::SeqCst);
        if self.destroy_queue.send(id).is_err() {
            debug!("Functor {} released after its manager went away", id);
        }
    }
}
