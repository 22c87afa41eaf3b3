//! C entry points called by the WebView embedder
//!
//! These route to the manager the renderer installed with
//! [`install_functor_manager`]. Before installation every call fails softly.

use std::sync::Arc;

use libc::{c_int, c_void, pid_t};
use log::{error, info, warn};
use parking_lot::RwLock;

use crate::ffi::WebViewFunctorCallbacks;
use crate::functor::FunctorId;
use crate::functor_manager::WebViewFunctorManager;

static FUNCTOR_MANAGER: RwLock<Option<Arc<WebViewFunctorManager>>> = RwLock::new(None);

/// Make `manager` the target of the exported C entry points.
pub fn install_functor_manager(manager: Arc<WebViewFunctorManager>) {
    crate::init_logging();

    let mut installed = FUNCTOR_MANAGER.write();
    if installed.is_some() {
        warn!("Replacing installed functor manager");
    }
    *installed = Some(manager);
    info!("Functor manager installed");
}

/// Detach the installed manager, returning it.
pub fn uninstall_functor_manager() -> Option<Arc<WebViewFunctorManager>> {
    FUNCTOR_MANAGER.write().take()
}

pub fn installed_functor_manager() -> Option<Arc<WebViewFunctorManager>> {
    FUNCTOR_MANAGER.read().clone()
}

#[no_mangle]
pub extern "C" fn WebViewFunctor_queryPlatformRenderMode() -> c_int {
    match installed_functor_manager() {
        Some(manager) => manager.query_platform_render_mode().as_raw(),
        None => panic!("WebViewFunctor_queryPlatformRenderMode: no functor manager installed"),
    }
}

/// Returns the new functor id, or -1 on failure.
#[no_mangle]
pub unsafe extern "C" fn WebViewFunctor_create(
    data: *mut c_void,
    callbacks: *const WebViewFunctorCallbacks,
    functor_mode: c_int,
) -> c_int {
    assert!(!callbacks.is_null(), "WebViewFunctor_create: callbacks are null");

    let Some(manager) = installed_functor_manager() else {
        error!("WebViewFunctor_create: no functor manager installed");
        return -1;
    };

    match manager.create_functor_raw(data, &*callbacks, functor_mode) {
        Ok(functor) => functor.as_raw(),
        Err(e) => {
            warn!("WebViewFunctor_create failed: {}", e);
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn WebViewFunctor_release(functor: c_int) {
    match installed_functor_manager() {
        Some(manager) => manager.release_functor(FunctorId::from_raw(functor)),
        None => error!("WebViewFunctor_release: no functor manager installed"),
    }
}

#[no_mangle]
pub unsafe extern "C" fn WebViewFunctor_reportRenderingThreads(
    functor: c_int,
    thread_ids: *const pid_t,
    size: usize,
) {
    let Some(manager) = installed_functor_manager() else {
        error!("WebViewFunctor_reportRenderingThreads: no functor manager installed");
        return;
    };

    let thread_ids = if thread_ids.is_null() || size == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(thread_ids, size)
    };
    manager.report_rendering_threads(FunctorId::from_raw(functor), thread_ids);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RenderPipelineType, RendererConfig};
    use crate::ffi::{RENDER_MODE_OPENGL_ES, RENDER_MODE_VULKAN};
    use crate::functor_manager::FunctorState;
    use crate::testing::*;

    // The installed manager is process-wide; keep every step in one test.
    #[test]
    fn test_entry_points_route_to_installed_manager() {
        let recorder = Recorder::new();
        let callbacks = recording_callbacks();

        uninstall_functor_manager();
        let id = unsafe { WebViewFunctor_create(recorder.data(), &callbacks, RENDER_MODE_OPENGL_ES) };
        assert_eq!(id, -1);
        WebViewFunctor_release(1);

        let manager = Arc::new(WebViewFunctorManager::new(RendererConfig::new(
            RenderPipelineType::SkiaGL,
        )));
        install_functor_manager(Arc::clone(&manager));
        assert_eq!(WebViewFunctor_queryPlatformRenderMode(), RENDER_MODE_OPENGL_ES);

        assert_eq!(
            unsafe { WebViewFunctor_create(recorder.data(), &callbacks, RENDER_MODE_VULKAN) },
            -1
        );
        assert_eq!(unsafe { WebViewFunctor_create(recorder.data(), &callbacks, 42) }, -1);

        let id = unsafe { WebViewFunctor_create(recorder.data(), &callbacks, RENDER_MODE_OPENGL_ES) };
        assert!(id > 0);
        let functor = FunctorId::from_raw(id);

        let threads: [pid_t; 3] = [11, 12, 11];
        unsafe { WebViewFunctor_reportRenderingThreads(id, threads.as_ptr(), threads.len()) };
        assert_eq!(manager.rendering_threads_for_active_functors(), vec![11, 12]);

        unsafe { WebViewFunctor_reportRenderingThreads(id, std::ptr::null(), 0) };
        assert!(manager.rendering_threads_for_active_functors().is_empty());

        WebViewFunctor_release(id);
        assert_eq!(manager.functor_state(functor), Some(FunctorState::Released));

        assert!(uninstall_functor_manager().is_some());
        assert!(installed_functor_manager().is_none());
    }
}
