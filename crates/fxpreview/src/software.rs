use std::sync::{Arc, Mutex};

use anyhow::Result;
use player::{
    DrawStatus, EffectEngine, EvalCallback, PixelBuffer, PixelFormat, RenderTarget, Rotation,
};
use tracing::{debug, warn};

/// In-memory render target backed by a plain RGBA buffer.
///
/// Stands in for the GPU surface so the player can be exercised end to end
/// on machines without a context to bind.
pub struct SoftwareTarget {
    state: Mutex<TargetState>,
}

#[derive(Default)]
struct TargetState {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    context_active: bool,
}

impl SoftwareTarget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TargetState::default()),
        })
    }

    /// Engine-side write access: the software engine renders straight into
    /// the target's buffer, the way a GPU engine draws into the bound
    /// surface.
    fn store_pixels(&self, width: u32, height: u32, pixels: Vec<u8>) {
        let mut state = self.state.lock().unwrap();
        state.width = width;
        state.height = height;
        state.pixels = pixels;
    }
}

impl RenderTarget for SoftwareTarget {
    fn init(&self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            anyhow::bail!("surface dimensions must be greater than zero");
        }
        let mut state = self.state.lock().unwrap();
        state.width = width;
        state.height = height;
        state.pixels = vec![0; PixelFormat::Rgba8.buffer_len(width, height)];
        debug!(width, height, "software target initialised");
        Ok(())
    }

    fn deinit(&self) {
        let mut state = self.state.lock().unwrap();
        state.pixels = Vec::new();
        state.width = 0;
        state.height = 0;
        debug!("software target deinitialised");
    }

    fn activate_context(&self) {
        self.state.lock().unwrap().context_active = true;
    }

    fn deactivate_context(&self) {
        self.state.lock().unwrap().context_active = false;
    }

    fn prepare_rendering(&self) {}

    fn surface_changed(&self, width: u32, height: u32) {
        let mut state = self.state.lock().unwrap();
        state.width = width;
        state.height = height;
        state.pixels = vec![0; PixelFormat::Rgba8.buffer_len(width, height)];
    }

    fn orient_image(&self, rotation: Rotation) {
        let mut state = self.state.lock().unwrap();
        let (pixels, width, height) =
            rotate_rgba(&state.pixels, state.width, state.height, rotation);
        state.pixels = pixels;
        state.width = width;
        state.height = height;
    }

    fn read_pixels(&self, format: PixelFormat) -> Result<PixelBuffer> {
        let state = self.state.lock().unwrap();
        match format {
            PixelFormat::Rgba8 => {
                PixelBuffer::new(state.width, state.height, format, state.pixels.clone())
            }
            other => anyhow::bail!("software target cannot read back {other:?}"),
        }
    }

    fn texture_id(&self) -> Option<u32> {
        None
    }
}

/// CPU effect engine applying a warm colour tint, standing in for the real
/// effect runtime. Draw reports `Pending` until a fresh frame has been
/// pushed, mirroring how a texture-driven renderer behaves.
pub struct TintEngine {
    target: Arc<SoftwareTarget>,
    strength: f32,
    state: Mutex<EngineState>,
}

#[derive(Default)]
struct EngineState {
    pending: Option<(PixelBuffer, Rotation, bool)>,
    effect: Option<String>,
}

impl TintEngine {
    pub fn new(target: Arc<SoftwareTarget>, tint_percent: u8) -> Self {
        Self {
            target,
            strength: f32::from(tint_percent.min(100)) / 100.0,
            state: Mutex::new(EngineState::default()),
        }
    }
}

impl EffectEngine for TintEngine {
    fn surface_created(&self, width: u32, height: u32) {
        debug!(width, height, "software engine surface created");
    }

    fn surface_changed(&self, width: u32, height: u32) {
        debug!(width, height, "software engine surface changed");
    }

    fn surface_destroyed(&self) {
        debug!("software engine surface destroyed");
    }

    fn push_frame(&self, image: PixelBuffer, rotation: Rotation, mirror: bool) {
        if image.format() != PixelFormat::Rgba8 {
            warn!(format = ?image.format(), "software engine only ingests RGBA; frame blanked");
            let blank = vec![0; PixelFormat::Rgba8.buffer_len(image.width(), image.height())];
            let image = PixelBuffer::new(image.width(), image.height(), PixelFormat::Rgba8, blank)
                .expect("blank frame geometry");
            self.state.lock().unwrap().pending = Some((image, rotation, mirror));
            return;
        }
        self.state.lock().unwrap().pending = Some((image, rotation, mirror));
    }

    fn draw(&self) -> DrawStatus {
        let mut state = self.state.lock().unwrap();
        let Some((image, rotation, mirror)) = state.pending.take() else {
            return DrawStatus::Pending;
        };

        let mut pixels = image.data().to_vec();
        let (mut width, mut height) = (image.width(), image.height());
        if mirror {
            pixels = mirror_rgba(&pixels, width, height);
        }
        let (rotated, rotated_width, rotated_height) =
            rotate_rgba(&pixels, width, height, rotation);
        pixels = rotated;
        width = rotated_width;
        height = rotated_height;

        if state.effect.is_some() {
            let shift = (self.strength * 64.0) as u8;
            for pixel in pixels.chunks_exact_mut(4) {
                pixel[0] = pixel[0].saturating_add(shift);
                pixel[2] = pixel[2].saturating_sub(shift);
            }
        }

        self.target.store_pixels(width, height, pixels);
        DrawStatus::Ready
    }

    fn pause(&self) {
        debug!("software engine paused");
    }

    fn resume(&self) {
        debug!("software engine resumed");
    }

    fn stop(&self) {
        debug!("software engine stopped");
    }

    fn load_effect(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        if path.is_empty() {
            state.effect = None;
            debug!("software engine effect unloaded");
        } else {
            state.effect = Some(path.to_string());
            debug!(path, "software engine effect loaded");
        }
    }

    fn call_script(&self, method: &str, param: &str) {
        debug!(method, param, "software engine script call ignored");
    }

    fn eval_script(&self, code: &str, callback: Option<EvalCallback>) {
        debug!(code, "software engine evaluating script");
        if let Some(callback) = callback {
            let effect = self.state.lock().unwrap().effect.clone();
            callback(effect.unwrap_or_else(|| "none".to_string()));
        }
    }
}

/// Rotates an RGBA buffer clockwise by the given quarter turns.
fn rotate_rgba(pixels: &[u8], width: u32, height: u32, rotation: Rotation) -> (Vec<u8>, u32, u32) {
    if rotation == Rotation::Deg0 || pixels.is_empty() {
        return (pixels.to_vec(), width, height);
    }

    let (w, h) = (width as usize, height as usize);
    let (out_width, out_height) = match rotation {
        Rotation::Deg90 | Rotation::Deg270 => (height, width),
        _ => (width, height),
    };
    let mut out = vec![0; pixels.len()];
    let out_w = out_width as usize;
    for y in 0..h {
        for x in 0..w {
            let (dst_x, dst_y) = match rotation {
                Rotation::Deg90 => (h - 1 - y, x),
                Rotation::Deg180 => (w - 1 - x, h - 1 - y),
                Rotation::Deg270 => (y, w - 1 - x),
                Rotation::Deg0 => (x, y),
            };
            let src = (y * w + x) * 4;
            let dst = (dst_y * out_w + dst_x) * 4;
            out[dst..dst + 4].copy_from_slice(&pixels[src..src + 4]);
        }
    }
    (out, out_width, out_height)
}

/// Flips an RGBA buffer horizontally.
fn mirror_rgba(pixels: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut out = vec![0; pixels.len()];
    for y in 0..h {
        for x in 0..w {
            let src = (y * w + x) * 4;
            let dst = (y * w + (w - 1 - x)) * 4;
            out[dst..dst + 4].copy_from_slice(&pixels[src..src + 4]);
        }
    }
    out
}
