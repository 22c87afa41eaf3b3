//! Functor registry
//!
//! Tracks every functor from registration until the render thread has torn it down:
//!
//! ```text
//!   create_functor        release_functor        process_pending_destroys
//!  ───────────────> Active ─────────────> Released ──────────────────────> (gone)
//!   (both sets)           (all-functors only)      last handle dropped,
//!                                                  id drained on render thread
//! ```
//!
//! IMPORTANT: The registry lock is only held for map/list updates and lookups. No
//! embedder callback, GPU or compositor call is ever made with it held; callers clone
//! the `Arc`s they need under the lock and work on them after releasing it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use libc::{c_void, pid_t};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::config::RendererConfig;
use crate::error::FunctorError;
use crate::ffi::*;
use crate::functor::{FunctorHandle, FunctorId, WebViewFunctor};
use crate::render_thread::RenderThread;

/// Lifecycle state of a registered functor
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FunctorState {
    /// Visible to draws and enumeration
    Active,
    /// Released by the embedder, still awaiting render-thread teardown
    Released,
}

struct Registry {
    /// Every functor that still needs context teardown, keyed by id
    functors: HashMap<FunctorId, Arc<WebViewFunctor>>,
    /// Handles of functors the embedder hasn't released, in creation order
    active: Vec<Arc<FunctorHandle>>,
}

pub struct WebViewFunctorManager {
    config: RendererConfig,
    next_id: AtomicI32,
    registry: Mutex<Registry>,
    destroy_tx: Mutex<Sender<FunctorId>>,
    destroy_rx: Mutex<Receiver<FunctorId>>,
}

impl WebViewFunctorManager {
    pub fn new(config: RendererConfig) -> Self {
        let (destroy_tx, destroy_rx) = mpsc::channel();
        info!(
            "Functor manager: platform render mode {:?}, overlays {}",
            config.platform_render_mode(),
            if config.enable_webview_overlays { "enabled" } else { "disabled" }
        );
        WebViewFunctorManager {
            config,
            next_id: AtomicI32::new(1),
            registry: Mutex::new(Registry {
                functors: HashMap::new(),
                active: Vec::new(),
            }),
            destroy_tx: Mutex::new(destroy_tx),
            destroy_rx: Mutex::new(destroy_rx),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn query_platform_render_mode(&self) -> RenderMode {
        self.config.platform_render_mode()
    }

    /// Register a functor and return its id.
    ///
    /// A Vulkan functor can't be served by a GL platform and is refused. A callback
    /// table missing entries the platform backend needs, or a null `data` pointer, is
    /// a contract violation and aborts.
    pub fn create_functor(
        &self,
        data: *mut c_void,
        callbacks: &WebViewFunctorCallbacks,
        mode: RenderMode,
    ) -> Result<FunctorId, FunctorError> {
        let platform = self.query_platform_render_mode();
        if mode == RenderMode::Vulkan && platform != RenderMode::Vulkan {
            warn!("Unable to map from GLES platform to a vulkan functor");
            return Err(FunctorError::UnsupportedRenderMode {
                requested: mode,
                platform,
            });
        }

        assert!(!data.is_null(), "functor data is null");
        callbacks.validate(platform);

        let id = FunctorId::from_raw(self.next_id.fetch_add(1, Ordering::SeqCst));
        let functor = Arc::new(WebViewFunctor::new(
            id,
            data,
            *callbacks,
            mode,
            self.config.enable_webview_overlays,
        ));
        let handle = functor.create_handle(self.destroy_tx.lock().clone());

        {
            let mut registry = self.registry.lock();
            registry.active.push(Arc::new(handle));
            registry.functors.insert(id, functor);
        }

        debug!("Created functor {} ({:?})", id, mode);
        Ok(id)
    }

    /// Same as [`create_functor`](Self::create_functor) with a raw render mode.
    pub fn create_functor_raw(
        &self,
        data: *mut c_void,
        callbacks: &WebViewFunctorCallbacks,
        raw_mode: libc::c_int,
    ) -> Result<FunctorId, FunctorError> {
        match RenderMode::from_raw(raw_mode) {
            Some(mode) => self.create_functor(data, callbacks, mode),
            None => {
                warn!("Unknown rendermode {}", raw_mode);
                Err(FunctorError::UnknownRenderMode(raw_mode))
            }
        }
    }

    /// Stop handing out `functor`. Its teardown is queued once the last outstanding
    /// handle reference is gone.
    pub fn release_functor(&self, functor: FunctorId) {
        let to_release = {
            let mut registry = self.registry.lock();
            registry
                .active
                .iter()
                .position(|handle| handle.id() == functor)
                .map(|index| registry.active.remove(index))
        };
        // Dropped outside the lock: may post the id to the destroy queue

        match to_release {
            Some(_) => debug!("Released functor {}", functor),
            None => debug!("release_functor: functor {} is not active", functor),
        }
    }

    /// Remove a released `functor` from the registry and run its teardown. Functors
    /// whose handle is still alive are left alone. Render thread only.
    pub(crate) fn destroy_functor(&self, functor: FunctorId, render_thread: &RenderThread) {
        let to_destroy = {
            let mut registry = self.registry.lock();
            match registry.functors.get(&functor) {
                Some(object) if object.has_live_handle() => {
                    debug!("destroy_functor: functor {} still has a handle", functor);
                    return;
                }
                Some(_) => registry.functors.remove(&functor),
                None => None,
            }
        };

        match to_destroy {
            Some(object) => {
                object.destroy(render_thread);
                debug!("Destroyed functor {}", functor);
            }
            None => debug!("destroy_functor: functor {} already gone", functor),
        }
    }

    /// Destroy every functor whose last handle was dropped. Render thread only.
    /// Returns the number of ids drained from the queue.
    pub fn process_pending_destroys(&self, render_thread: &RenderThread) -> usize {
        let pending: Vec<FunctorId> = self.destroy_rx.lock().try_iter().collect();
        for &functor in &pending {
            self.destroy_functor(functor, render_thread);
        }
        pending.len()
    }

    /// The render thread's GPU context is going away: tear down every functor context.
    pub fn on_context_destroyed(&self, render_thread: &RenderThread) {
        let ids: Vec<FunctorId> = self.registry.lock().functors.keys().copied().collect();

        for functor in ids {
            // Re-resolve each id; anything removed since the snapshot is skipped
            let object = self.registry.lock().functors.get(&functor).cloned();
            if let Some(object) = object {
                object.destroy_context(render_thread);
            }
        }
    }

    /// Replace the rendering threads of `functor`.
    pub fn report_rendering_threads(&self, functor: FunctorId, thread_ids: &[pid_t]) {
        let registry = self.registry.lock();
        match registry.functors.get(&functor) {
            Some(object) => object.report_rendering_threads(thread_ids),
            None => debug!("report_rendering_threads: unknown functor {}", functor),
        }
    }

    /// Union of the rendering threads of all active functors, without duplicates.
    pub fn rendering_threads_for_active_functors(&self) -> Vec<pid_t> {
        let mut rendering_threads = Vec::new();
        let registry = self.registry.lock();
        for handle in &registry.active {
            for tid in handle.rendering_threads() {
                if !rendering_threads.contains(&tid) {
                    rendering_threads.push(tid);
                }
            }
        }
        rendering_threads
    }

    pub fn handle_for(&self, functor: FunctorId) -> Option<Arc<FunctorHandle>> {
        self.registry
            .lock()
            .active
            .iter()
            .find(|handle| handle.id() == functor)
            .cloned()
    }

    pub fn functor_state(&self, functor: FunctorId) -> Option<FunctorState> {
        let registry = self.registry.lock();
        if registry.active.iter().any(|handle| handle.id() == functor) {
            Some(FunctorState::Active)
        } else if registry.functors.contains_key(&functor) {
            Some(FunctorState::Released)
        } else {
            None
        }
    }

    /// Ids of active functors, in creation order
    pub fn active_functors(&self) -> Vec<FunctorId> {
        self.registry.lock().active.iter().map(|handle| handle.id()).collect()
    }

    // ========================================================================
    // Render-thread forwards. Each returns false when the functor isn't active.
    // ========================================================================

    pub fn sync(&self, functor: FunctorId, sync_data: &WebViewSyncData) -> bool {
        self.with_handle(functor, |handle| handle.sync(sync_data))
    }

    pub fn draw_gl(&self, functor: FunctorId, render_thread: &RenderThread, draw_info: &DrawGlInfo) -> bool {
        self.with_handle(functor, |handle| handle.draw_gl(render_thread, draw_info))
    }

    pub fn init_vk(&self, functor: FunctorId, params: &VkFunctorInitParams) -> bool {
        self.with_handle(functor, |handle| handle.init_vk(params))
    }

    pub fn draw_vk(
        &self,
        functor: FunctorId,
        render_thread: &RenderThread,
        params: &VkFunctorDrawParams,
    ) -> bool {
        self.with_handle(functor, |handle| handle.draw_vk(render_thread, params))
    }

    pub fn post_draw_vk(&self, functor: FunctorId) -> bool {
        self.with_handle(functor, |handle| handle.post_draw_vk())
    }

    pub fn remove_overlays(&self, functor: FunctorId, render_thread: &RenderThread) -> bool {
        self.with_handle(functor, |handle| handle.remove_overlays(render_thread))
    }

    pub fn on_removed_from_tree(&self, functor: FunctorId, render_thread: &RenderThread) -> bool {
        self.with_handle(functor, |handle| handle.on_removed_from_tree(render_thread))
    }

    fn with_handle<F>(&self, functor: FunctorId, f: F) -> bool
    where
        F: FnOnce(&FunctorHandle),
    {
        match self.handle_for(functor) {
            Some(handle) => {
                f(&handle);
                true
            }
            None => false,
        }
    }
}
