use std::sync::Arc;

use anyhow::Result;

use crate::frame::ProcessedFrame;
use crate::types::{DrawStatus, PixelBuffer, PixelFormat, Rotation};

/// Completion callback for one processing request.
///
/// Invoked exactly once per accepted request, on the render worker thread.
/// `None` means the frame was dropped (superseded, contention, paused or
/// stopped mid-draw) rather than rendered; rejected requests receive `None`
/// on the calling thread instead. The frame accessors stay valid for the
/// duration of the callback, while the worker still holds the context.
pub type ProcessCallback = Box<dyn FnOnce(Option<Arc<ProcessedFrame>>) + Send + 'static>;

/// Callback receiving the engine's reply to an evaluated script.
pub type EvalCallback = Box<dyn FnOnce(String) + Send + 'static>;

/// The external effect engine: ingests frames and renders effects onto the
/// active render target. All methods are invoked on the render worker thread
/// with the context active, except [`EffectEngine::pause`],
/// [`EffectEngine::resume`] and [`EffectEngine::stop`], which are forwarded
/// immediately from whichever thread issued the command.
pub trait EffectEngine: Send + Sync {
    fn surface_created(&self, width: u32, height: u32);
    fn surface_changed(&self, width: u32, height: u32);
    fn surface_destroyed(&self);

    /// Hands a source image plus its orientation metadata to the engine.
    fn push_frame(&self, image: PixelBuffer, rotation: Rotation, mirror: bool);

    /// Attempts to render the pushed frame. The pipeline retries with
    /// backoff until this reports [`DrawStatus::Ready`] or the player leaves
    /// the running state.
    fn draw(&self) -> DrawStatus;

    fn pause(&self);
    fn resume(&self);
    fn stop(&self);

    /// Loads the effect at `path`; an empty path unloads the active effect.
    fn load_effect(&self, path: &str);

    /// Invokes a named method exposed by the loaded effect's script.
    fn call_script(&self, method: &str, param: &str);

    /// Evaluates a script snippet, replying through `callback` if present.
    fn eval_script(&self, code: &str, callback: Option<EvalCallback>);
}

/// The off-screen GPU surface and its context. Owns the pixel storage the
/// engine renders into. All methods run on the render worker thread; the
/// context has thread affinity, which is why the player funnels every call
/// through its scheduler.
pub trait RenderTarget: Send + Sync {
    /// Brings the surface up at the given dimensions. The only fallible
    /// lifecycle call; a failure here aborts player construction.
    fn init(&self, width: u32, height: u32) -> Result<()>;
    fn deinit(&self);

    fn activate_context(&self);
    fn deactivate_context(&self);

    /// Prepares the target to receive a new rendered frame.
    fn prepare_rendering(&self);
    fn surface_changed(&self, width: u32, height: u32);

    /// Rotates the rendered result into the caller-requested orientation.
    fn orient_image(&self, rotation: Rotation);

    /// Reads the rendered result back into CPU memory.
    fn read_pixels(&self, format: PixelFormat) -> Result<PixelBuffer>;

    /// GPU texture backing the rendered result, when one exists.
    fn texture_id(&self) -> Option<u32>;
}
