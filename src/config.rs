//! Renderer configuration
//!
//! Holds the render pipeline the platform was brought up with and whether WebView
//! overlays may be attached. Values normally come from system properties.

use log::warn;

use crate::error::ConfigError;
use crate::ffi::RenderMode;

/// Property selecting the render pipeline (`skiagl` or `skiavk`)
pub const PROPERTY_RENDERER: &str = "debug.hwui.renderer";

/// Property toggling WebView overlay support
pub const PROPERTY_WEBVIEW_OVERLAYS: &str = "debug.hwui.webview_overlays_enabled";

/// Render pipeline used by the platform renderer
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RenderPipelineType {
    #[default]
    SkiaGL,
    SkiaVulkan,
}

impl RenderPipelineType {
    /// Parse a renderer property value. Unknown values yield `None`.
    pub fn from_property(value: &str) -> Option<Self> {
        match value.trim() {
            "skiagl" => Some(RenderPipelineType::SkiaGL),
            "skiavk" => Some(RenderPipelineType::SkiaVulkan),
            _ => None,
        }
    }

    /// Functor render mode matching this pipeline
    pub fn render_mode(self) -> RenderMode {
        match self {
            RenderPipelineType::SkiaGL => RenderMode::OpenGL_ES,
            RenderPipelineType::SkiaVulkan => RenderMode::Vulkan,
        }
    }
}

/// Configuration for the functor manager
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RendererConfig {
    /// Pipeline the render thread draws with
    pub render_pipeline: RenderPipelineType,
    /// Whether functors may attach overlay surfaces
    pub enable_webview_overlays: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        RendererConfig {
            render_pipeline: RenderPipelineType::default(),
            enable_webview_overlays: Self::DEFAULT_WEBVIEW_OVERLAYS,
        }
    }
}

impl RendererConfig {
    /// Overlays are off unless explicitly enabled
    pub const DEFAULT_WEBVIEW_OVERLAYS: bool = false;

    /// Create a configuration for the given pipeline with overlays disabled.
    pub fn new(render_pipeline: RenderPipelineType) -> Self {
        RendererConfig {
            render_pipeline,
            ..Default::default()
        }
    }

    /// Build a configuration from a property lookup. Unrecognised values log a
    /// warning and keep the default.
    ///
    /// # Arguments
    /// * `lookup` - Returns the value of a system property, or `None` when unset
    pub fn from_properties<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RendererConfig::default();

        if let Some(value) = lookup(PROPERTY_RENDERER) {
            match RenderPipelineType::from_property(&value) {
                Some(pipeline) => config.render_pipeline = pipeline,
                None => warn!("Unknown {} value '{}', using SkiaGL", PROPERTY_RENDERER, value),
            }
        }

        if let Some(value) = lookup(PROPERTY_WEBVIEW_OVERLAYS) {
            match parse_bool(PROPERTY_WEBVIEW_OVERLAYS, &value) {
                Ok(enabled) => config.enable_webview_overlays = enabled,
                Err(e) => warn!("{}, using {}", e, Self::DEFAULT_WEBVIEW_OVERLAYS),
            }
        }

        config
    }

    /// Set the render pipeline.
    pub fn with_render_pipeline(mut self, render_pipeline: RenderPipelineType) -> Self {
        self.render_pipeline = render_pipeline;
        self
    }

    /// Enable or disable WebView overlays.
    pub fn with_webview_overlays(mut self, enabled: bool) -> Self {
        self.enable_webview_overlays = enabled;
        self
    }

    /// Render mode functors must use on this platform
    pub fn platform_render_mode(&self) -> RenderMode {
        self.render_pipeline.render_mode()
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" | "true" | "y" | "yes" | "on" => Ok(true),
        "0" | "false" | "n" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: value.to_string(),
        }),
    }
}
