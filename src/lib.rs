//! WebView functor manager for the Android render thread
//!
//! Tracks the lifetime of functors registered by the WebView embedder: callback
//! bundles that are created and released from arbitrary threads but only ever drawn
//! and torn down on the render thread.

#![allow(non_snake_case)]
#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]

pub mod config;
pub mod error;
pub mod exports;
pub mod ffi;
pub mod functor;
pub mod functor_manager;
pub mod render_thread;
pub mod surface;

#[cfg(test)]
mod testing;

pub use config::{RenderPipelineType, RendererConfig};
pub use error::{ConfigError, FunctorError};
pub use exports::{install_functor_manager, installed_functor_manager, uninstall_functor_manager};
pub use ffi::{OverlaysMode, RenderMode, WebViewFunctorCallbacks};
pub use functor::{FunctorHandle, FunctorId, WebViewFunctor};
pub use functor_manager::{FunctorState, WebViewFunctorManager};
pub use render_thread::RenderThread;
pub use surface::{CanvasContext, GpuContext, SurfaceComposer, SurfaceControl, Transaction};

/// Tag used for Android log output
pub const LOG_TAG: &str = "WebViewFunctor";

/// Install the platform logger. Safe to call more than once.
#[cfg(target_os = "android")]
pub fn init_logging() {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag(LOG_TAG),
    );
}

/// Install the platform logger. Off Android, the host application owns the logger.
#[cfg(not(target_os = "android"))]
pub fn init_logging() {}
