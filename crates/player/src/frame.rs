use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;

use crate::engine::RenderTarget;
use crate::types::{PixelBuffer, PixelFormat};

/// The shared "most recent processed frame" slot.
///
/// One instance exists per player and is reused for every processed frame.
/// The lock flag keeps a second processing pass from starting while the slot
/// is in use; all mutation of the underlying target happens on the single
/// render worker thread, so the flag only guards logical re-entrancy.
pub struct ProcessedFrame {
    target: Arc<dyn RenderTarget>,
    locked: AtomicBool,
}

impl ProcessedFrame {
    pub(crate) fn new(target: Arc<dyn RenderTarget>) -> Arc<Self> {
        Arc::new(Self {
            target,
            locked: AtomicBool::new(false),
        })
    }

    /// Marks the slot as in use. While locked, the pipeline drops incoming
    /// frames instead of rendering over the slot.
    pub fn lock(&self) {
        self.locked.store(true, Ordering::Release);
    }

    /// Releases the slot. The pipeline step that locked it unlocks it on
    /// every exit path; callers who extend the hold own the matching unlock.
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Rendered result as interleaved RGBA bytes.
    pub fn read_rgba(&self) -> Result<PixelBuffer> {
        self.target.read_pixels(PixelFormat::Rgba8)
    }

    /// Rendered result as NV12 planes.
    pub fn read_nv12(&self) -> Result<PixelBuffer> {
        self.target.read_pixels(PixelFormat::Nv12)
    }

    /// GPU texture backing the result, when the target exposes one.
    pub fn texture_id(&self) -> Option<u32> {
        self.target.texture_id()
    }
}
