//! Compositor collaborators
//!
//! The functor manager never talks to SurfaceFlinger directly. It builds
//! [`Transaction`]s and hands them either to the active [`CanvasContext`], so they
//! land with the next frame, or to the [`SurfaceComposer`] for immediate apply.

use std::ptr::NonNull;

use crate::ffi::{ASurfaceControl, ASurfaceTransaction};

/// Name given to the overlay surface created for a functor
pub const OVERLAY_SURFACE_NAME: &str = "Webview Overlay SurfaceControl";

/// Opaque reference to a native surface control. Lifetime is owned by the compositor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceControl(NonNull<ASurfaceControl>);

// Surface controls are reference counted handles on the compositor side and may be
// passed between threads.
unsafe impl Send for SurfaceControl {}
unsafe impl Sync for SurfaceControl {}

impl SurfaceControl {
    /// Wrap a native surface control. Returns `None` for null.
    pub fn from_raw(ptr: *mut ASurfaceControl) -> Option<Self> {
        NonNull::new(ptr).map(SurfaceControl)
    }

    #[inline]
    pub fn as_ptr(self) -> *mut ASurfaceControl {
        self.0.as_ptr()
    }
}

/// A transaction handed over by the embedder
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NativeTransaction(NonNull<ASurfaceTransaction>);

unsafe impl Send for NativeTransaction {}

impl NativeTransaction {
    pub fn from_raw(ptr: *mut ASurfaceTransaction) -> Option<Self> {
        NonNull::new(ptr).map(NativeTransaction)
    }

    #[inline]
    pub fn as_ptr(self) -> *mut ASurfaceTransaction {
        self.0.as_ptr()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Reparent {
        surface: SurfaceControl,
        parent: Option<SurfaceControl>,
    },
    SetLayer {
        surface: SurfaceControl,
        z: i32,
    },
    Show {
        surface: SurfaceControl,
    },
    Native(NativeTransaction),
}

/// Ordered batch of surface operations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    ops: Vec<SurfaceOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an embedder transaction
    pub fn from_native(native: NativeTransaction) -> Self {
        Transaction {
            ops: vec![SurfaceOp::Native(native)],
        }
    }

    pub fn reparent(mut self, surface: SurfaceControl, parent: Option<SurfaceControl>) -> Self {
        self.ops.push(SurfaceOp::Reparent { surface, parent });
        self
    }

    pub fn set_layer(mut self, surface: SurfaceControl, z: i32) -> Self {
        self.ops.push(SurfaceOp::SetLayer { surface, z });
        self
    }

    pub fn show(mut self, surface: SurfaceControl) -> Self {
        self.ops.push(SurfaceOp::Show { surface });
        self
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Client connection to the compositor
pub trait SurfaceComposer {
    /// Create a buffer-state child surface under `parent`.
    fn create_surface(&self, name: &str, parent: SurfaceControl) -> SurfaceControl;

    /// Apply a transaction immediately.
    fn apply(&self, transaction: Transaction);
}

/// Render context currently driving frames on the render thread
pub trait CanvasContext {
    /// Root surface of the window being drawn, if the context has one.
    fn surface_control(&self) -> Option<SurfaceControl>;

    /// Bumped every time the root surface is replaced.
    fn surface_control_generation_id(&self) -> i32;

    /// Merge into the next frame's transaction. Returns `false` if the caller must
    /// apply the transaction itself.
    fn merge_transaction(&self, transaction: &Transaction, surface: Option<SurfaceControl>) -> bool;

    /// Called once an overlay child surface has been created under the root.
    fn prepare_surface_control_for_webview(&self);
}

/// GPU context shared by every functor on the render thread
pub trait GpuContext {
    /// Invalidate cached GPU state after an embedder tore down its context.
    fn reset_context(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(addr: usize) -> SurfaceControl {
        SurfaceControl::from_raw(addr as *mut ASurfaceControl).unwrap()
    }

    #[test]
    fn test_null_surface_is_rejected() {
        assert!(SurfaceControl::from_raw(std::ptr::null_mut()).is_none());
        assert!(NativeTransaction::from_raw(std::ptr::null_mut()).is_none());
    }

    #[test]
    fn test_transaction_keeps_op_order() {
        let overlay = surface(0x10);
        let root = surface(0x20);

        let txn = Transaction::new().set_layer(overlay, -1).show(overlay).reparent(overlay, Some(root));

        assert_eq!(
            txn.ops(),
            &[
                SurfaceOp::SetLayer { surface: overlay, z: -1 },
                SurfaceOp::Show { surface: overlay },
                SurfaceOp::Reparent {
                    surface: overlay,
                    parent: Some(root)
                },
            ]
        );
        assert!(!txn.is_empty());
        assert!(Transaction::new().is_empty());
    }
}
