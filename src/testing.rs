//! Test doubles for the compositor collaborators and an embedder that records every
//! callback it receives.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

use libc::{c_int, c_void};

use crate::ffi::*;
use crate::render_thread::RenderThread;
use crate::surface::{CanvasContext, GpuContext, SurfaceComposer, SurfaceControl, Transaction};

/// Fake transaction pointer handed back by the recorder's removeOverlays callback
pub const REMOVE_TRANSACTION: usize = 0x7700;

pub fn surface(addr: usize) -> SurfaceControl {
    SurfaceControl::from_raw(addr as *mut ASurfaceControl).unwrap()
}

pub fn render_thread() -> (RenderThread, Rc<FakeComposer>) {
    let composer = Rc::new(FakeComposer::default());
    (RenderThread::new(composer.clone()), composer)
}

#[derive(Default)]
pub struct FakeComposer {
    created: RefCell<Vec<(String, SurfaceControl)>>,
    applied: RefCell<Vec<Transaction>>,
    next_surface: Cell<usize>,
}

impl FakeComposer {
    pub fn created(&self) -> Vec<(String, SurfaceControl)> {
        self.created.borrow().clone()
    }

    pub fn applied(&self) -> Vec<Transaction> {
        self.applied.borrow().clone()
    }
}

impl SurfaceComposer for FakeComposer {
    fn create_surface(&self, name: &str, parent: SurfaceControl) -> SurfaceControl {
        let n = self.next_surface.get() + 1;
        self.next_surface.set(n);
        self.created.borrow_mut().push((name.to_string(), parent));
        surface(0x1000 + n * 0x10)
    }

    fn apply(&self, transaction: Transaction) {
        self.applied.borrow_mut().push(transaction);
    }
}

pub struct FakeCanvasContext {
    root: Option<SurfaceControl>,
    pub generation: Cell<i32>,
    pub prepared: Cell<u32>,
    merged: RefCell<Vec<Transaction>>,
    accept_merges: bool,
}

impl FakeCanvasContext {
    pub fn new(root: SurfaceControl, generation: i32) -> Self {
        FakeCanvasContext {
            root: Some(root),
            generation: Cell::new(generation),
            prepared: Cell::new(0),
            merged: RefCell::new(Vec::new()),
            accept_merges: true,
        }
    }

    /// Context that has not set up its root surface yet
    pub fn without_root() -> Self {
        FakeCanvasContext {
            root: None,
            ..Self::new(surface(0x1), 0)
        }
    }

    pub fn declining_merges(mut self) -> Self {
        self.accept_merges = false;
        self
    }

    pub fn merged(&self) -> Vec<Transaction> {
        self.merged.borrow().clone()
    }
}

impl CanvasContext for FakeCanvasContext {
    fn surface_control(&self) -> Option<SurfaceControl> {
        self.root
    }

    fn surface_control_generation_id(&self) -> i32 {
        self.generation.get()
    }

    fn merge_transaction(&self, transaction: &Transaction, _surface: Option<SurfaceControl>) -> bool {
        if self.accept_merges {
            self.merged.borrow_mut().push(transaction.clone());
        }
        self.accept_merges
    }

    fn prepare_surface_control_for_webview(&self) {
        self.prepared.set(self.prepared.get() + 1);
    }
}

#[derive(Default)]
pub struct FakeGpuContext {
    pub resets: Cell<u32>,
}

impl GpuContext for FakeGpuContext {
    fn reset_context(&self) {
        self.resets.set(self.resets.get() + 1);
    }
}

/// Embedder state reached through the functor's data pointer
#[derive(Default)]
pub struct Recorder {
    pub syncs: AtomicUsize,
    pub force_dark: AtomicBool,
    pub context_destroyed: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub overlays_removed: AtomicUsize,
    pub gl_draws: AtomicUsize,
    pub vk_inits: AtomicUsize,
    pub vk_draws: AtomicUsize,
    pub vk_post_draws: AtomicUsize,
    /// Ask for the overlay surface whenever a draw offers overlays
    pub request_surface_on_draw: AtomicBool,
    /// Hand a transaction back while overlays are being removed
    pub merge_on_remove: AtomicBool,
    overlays_mode: AtomicI32,
    surface_ptr: AtomicUsize,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        let recorder = Recorder::default();
        recorder.overlays_mode.store(-1, Ordering::SeqCst);
        Arc::new(recorder)
    }

    /// Pointer registered as the functor's data. Valid while the `Arc` lives.
    pub fn data(self: &Arc<Self>) -> *mut c_void {
        Arc::as_ptr(self) as *mut c_void
    }

    pub fn count(&self, counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn last_overlays_mode(&self) -> Option<OverlaysMode> {
        match self.overlays_mode.load(Ordering::SeqCst) {
            0 => Some(OverlaysMode::Disabled),
            1 => Some(OverlaysMode::Enabled),
            _ => None,
        }
    }

    pub fn surface_ptr(&self) -> usize {
        self.surface_ptr.load(Ordering::SeqCst)
    }
}

unsafe fn recorder<'a>(data: *mut c_void) -> &'a Recorder {
    &*(data as *const Recorder)
}

unsafe fn record_overlay(recorder: &Recorder, overlay: &WebViewOverlayData) {
    recorder
        .overlays_mode
        .store(overlay.overlays_mode as i32, Ordering::SeqCst);
    if overlay.overlays_mode == OverlaysMode::Enabled
        && recorder.request_surface_on_draw.load(Ordering::SeqCst)
    {
        let ptr = (overlay.get_surface_control)(overlay.token);
        recorder.surface_ptr.store(ptr as usize, Ordering::SeqCst);
    }
}

unsafe extern "C" fn on_sync(_functor: c_int, data: *mut c_void, sync: *const WebViewSyncData) {
    let recorder = recorder(data);
    recorder.syncs.fetch_add(1, Ordering::SeqCst);
    recorder
        .force_dark
        .store((*sync).apply_force_dark, Ordering::SeqCst);
}

unsafe extern "C" fn on_context_destroyed(_functor: c_int, data: *mut c_void) {
    recorder(data).context_destroyed.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn on_destroyed(_functor: c_int, data: *mut c_void) {
    recorder(data).destroyed.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn remove_overlays(
    _functor: c_int,
    data: *mut c_void,
    token: *mut c_void,
    merge_transaction: MergeTransactionFn,
) {
    let recorder = recorder(data);
    recorder.overlays_removed.fetch_add(1, Ordering::SeqCst);
    if recorder.merge_on_remove.load(Ordering::SeqCst) {
        merge_transaction(token, REMOVE_TRANSACTION as *mut ASurfaceTransaction);
    }
    // Null transactions are ignored
    merge_transaction(token, std::ptr::null_mut());
}

unsafe extern "C" fn gl_draw(
    _functor: c_int,
    data: *mut c_void,
    _draw_info: *const DrawGlInfo,
    overlay: *const WebViewOverlayData,
) {
    let recorder = recorder(data);
    recorder.gl_draws.fetch_add(1, Ordering::SeqCst);
    record_overlay(recorder, &*overlay);
}

unsafe extern "C" fn vk_initialize(_functor: c_int, data: *mut c_void, _params: *const VkFunctorInitParams) {
    recorder(data).vk_inits.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn vk_draw(
    _functor: c_int,
    data: *mut c_void,
    _params: *const VkFunctorDrawParams,
    overlay: *const WebViewOverlayData,
) {
    let recorder = recorder(data);
    recorder.vk_draws.fetch_add(1, Ordering::SeqCst);
    record_overlay(recorder, &*overlay);
}

unsafe extern "C" fn vk_post_draw(_functor: c_int, data: *mut c_void) {
    recorder(data).vk_post_draws.fetch_add(1, Ordering::SeqCst);
}

/// Complete callback table covering both backends
pub fn recording_callbacks() -> WebViewFunctorCallbacks {
    WebViewFunctorCallbacks {
        on_sync: Some(on_sync),
        on_context_destroyed: Some(on_context_destroyed),
        on_destroyed: Some(on_destroyed),
        remove_overlays: Some(remove_overlays),
        gles: GlesCallbacks { draw: Some(gl_draw) },
        vk: VkCallbacks {
            initialize: Some(vk_initialize),
            draw: Some(vk_draw),
            post_draw: Some(vk_post_draw),
        },
    }
}
