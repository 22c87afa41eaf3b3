//! Recoverable error types
//!
//! Contract violations by the embedder (bad callback tables, nested draws, a second
//! handle for one functor) are not represented here: those abort.

use crate::ffi::RenderMode;
use libc::c_int;
use thiserror::Error;

/// Why a functor could not be registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FunctorError {
    #[error("unknown render mode {0}")]
    UnknownRenderMode(c_int),

    #[error("unable to map from {platform:?} platform to a {requested:?} functor")]
    UnsupportedRenderMode {
        requested: RenderMode,
        platform: RenderMode,
    },
}

/// Malformed renderer configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("property {key} has invalid boolean value '{value}'")]
    InvalidBool { key: &'static str, value: String },
}
