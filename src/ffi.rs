//! C ABI types shared with the WebView embedder
//!
//! Mirrors the layout of the functor callback table and the per-call parameter
//! blocks handed to the embedder's draw, init and sync entry points.

use libc::{c_char, c_int, c_void};

// Render mode constants as they travel over the C boundary
pub const RENDER_MODE_OPENGL_ES: c_int = 0;
pub const RENDER_MODE_VULKAN: c_int = 1;

/// GPU backend a functor is drawn with
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RenderMode {
    OpenGL_ES = RENDER_MODE_OPENGL_ES,
    Vulkan = RENDER_MODE_VULKAN,
}

impl RenderMode {
    /// Map a raw render mode coming from the embedder
    pub fn from_raw(raw: c_int) -> Option<Self> {
        match raw {
            RENDER_MODE_OPENGL_ES => Some(RenderMode::OpenGL_ES),
            RENDER_MODE_VULKAN => Some(RenderMode::Vulkan),
            _ => None,
        }
    }

    #[inline]
    pub fn as_raw(self) -> c_int {
        self as c_int
    }
}

/// Whether the embedder may attach overlays during this draw
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OverlaysMode {
    Disabled = 0,
    Enabled = 1,
}

/// Opaque native surface control
#[repr(C)]
pub struct ASurfaceControl {
    _private: [u8; 0],
}

/// Opaque native surface transaction
#[repr(C)]
pub struct ASurfaceTransaction {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct WebViewSyncData {
    pub apply_force_dark: bool,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct DrawGlInfo {
    pub clip_left: c_int,
    pub clip_top: c_int,
    pub clip_right: c_int,
    pub clip_bottom: c_int,
    pub width: c_int,
    pub height: c_int,
    pub is_layer: bool,
    pub transform: [f32; 16],
    pub color_space_ptr: *mut c_void,
    pub current_hdr_sdr_ratio: f32,
    pub fbo: c_int,
}

impl Default for DrawGlInfo {
    fn default() -> Self {
        DrawGlInfo {
            clip_left: 0,
            clip_top: 0,
            clip_right: 0,
            clip_bottom: 0,
            width: 0,
            height: 0,
            is_layer: false,
            transform: IDENTITY_TRANSFORM,
            color_space_ptr: std::ptr::null_mut(),
            current_hdr_sdr_ratio: 1.0,
            fbo: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct VkFunctorInitParams {
    pub instance: *mut c_void,
    pub physical_device: *mut c_void,
    pub device: *mut c_void,
    pub queue: *mut c_void,
    pub graphics_queue_index: u32,
    pub api_version: u32,
    pub enabled_instance_extension_names: *const *const c_char,
    pub enabled_instance_extension_names_length: u32,
    pub enabled_device_extension_names: *const *const c_char,
    pub enabled_device_extension_names_length: u32,
    pub device_features: *const c_void,
    pub device_features_2: *const c_void,
}

impl Default for VkFunctorInitParams {
    fn default() -> Self {
        VkFunctorInitParams {
            instance: std::ptr::null_mut(),
            physical_device: std::ptr::null_mut(),
            device: std::ptr::null_mut(),
            queue: std::ptr::null_mut(),
            graphics_queue_index: 0,
            api_version: 0,
            enabled_instance_extension_names: std::ptr::null(),
            enabled_instance_extension_names_length: 0,
            enabled_device_extension_names: std::ptr::null(),
            enabled_device_extension_names_length: 0,
            device_features: std::ptr::null(),
            device_features_2: std::ptr::null(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct VkFunctorDrawParams {
    pub width: c_int,
    pub height: c_int,
    pub color_space_ptr: *mut c_void,
    pub transform: [f32; 16],
    pub secondary_command_buffer: *mut c_void,
    pub color_attachment_index: u32,
    pub compatible_render_pass: *mut c_void,
    pub format: c_int,
    pub clip_left: c_int,
    pub clip_top: c_int,
    pub clip_right: c_int,
    pub clip_bottom: c_int,
    pub is_layer: bool,
    pub current_hdr_sdr_ratio: f32,
}

impl Default for VkFunctorDrawParams {
    fn default() -> Self {
        VkFunctorDrawParams {
            width: 0,
            height: 0,
            color_space_ptr: std::ptr::null_mut(),
            transform: IDENTITY_TRANSFORM,
            secondary_command_buffer: std::ptr::null_mut(),
            color_attachment_index: 0,
            compatible_render_pass: std::ptr::null_mut(),
            format: 0,
            clip_left: 0,
            clip_top: 0,
            clip_right: 0,
            clip_bottom: 0,
            is_layer: false,
            current_hdr_sdr_ratio: 1.0,
        }
    }
}

const IDENTITY_TRANSFORM: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

// Overlay accessors. `token` identifies the functor currently being drawn and is
// only valid for the duration of the callback it was handed to.
pub type GetSurfaceControlFn = unsafe extern "C" fn(token: *mut c_void) -> *mut ASurfaceControl;
pub type MergeTransactionFn =
    unsafe extern "C" fn(token: *mut c_void, transaction: *mut ASurfaceTransaction);

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct WebViewOverlayData {
    pub overlays_mode: OverlaysMode,
    pub token: *mut c_void,
    pub get_surface_control: GetSurfaceControlFn,
    pub merge_transaction: MergeTransactionFn,
}

// Callback function types
pub type FunctorOnSync =
    Option<unsafe extern "C" fn(functor: c_int, data: *mut c_void, sync: *const WebViewSyncData)>;
pub type FunctorOnContextDestroyed = Option<unsafe extern "C" fn(functor: c_int, data: *mut c_void)>;
pub type FunctorOnDestroyed = Option<unsafe extern "C" fn(functor: c_int, data: *mut c_void)>;
pub type FunctorRemoveOverlays = Option<
    unsafe extern "C" fn(
        functor: c_int,
        data: *mut c_void,
        token: *mut c_void,
        merge_transaction: MergeTransactionFn,
    ),
>;

pub type GlesDraw = Option<
    unsafe extern "C" fn(
        functor: c_int,
        data: *mut c_void,
        draw_info: *const DrawGlInfo,
        overlay: *const WebViewOverlayData,
    ),
>;

pub type VkInitialize =
    Option<unsafe extern "C" fn(functor: c_int, data: *mut c_void, params: *const VkFunctorInitParams)>;
pub type VkDraw = Option<
    unsafe extern "C" fn(
        functor: c_int,
        data: *mut c_void,
        params: *const VkFunctorDrawParams,
        overlay: *const WebViewOverlayData,
    ),
>;
pub type VkPostDraw = Option<unsafe extern "C" fn(functor: c_int, data: *mut c_void)>;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct GlesCallbacks {
    pub draw: GlesDraw,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct VkCallbacks {
    pub initialize: VkInitialize,
    pub draw: VkDraw,
    pub post_draw: VkPostDraw,
}

/// Callback bundle supplied by the embedder when registering a functor
#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct WebViewFunctorCallbacks {
    pub on_sync: FunctorOnSync,
    pub on_context_destroyed: FunctorOnContextDestroyed,
    pub on_destroyed: FunctorOnDestroyed,
    pub remove_overlays: FunctorRemoveOverlays,
    pub gles: GlesCallbacks,
    pub vk: VkCallbacks,
}

impl WebViewFunctorCallbacks {
    /// Abort on a callback table that cannot serve the platform backend.
    pub fn validate(&self, platform_mode: RenderMode) {
        assert!(self.on_sync.is_some(), "onSync is null");
        assert!(self.on_context_destroyed.is_some(), "onContextDestroyed is null");
        assert!(self.on_destroyed.is_some(), "onDestroyed is null");
        assert!(self.remove_overlays.is_some(), "removeOverlays is null");
        match platform_mode {
            RenderMode::OpenGL_ES => {
                assert!(self.gles.draw.is_some(), "gles.draw is null");
            }
            RenderMode::Vulkan => {
                assert!(self.vk.initialize.is_some(), "vk.initialize is null");
                assert!(self.vk.draw.is_some(), "vk.draw is null");
                assert!(self.vk.post_draw.is_some(), "vk.post_draw is null");
            }
        }
    }
}
