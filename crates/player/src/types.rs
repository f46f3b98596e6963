use anyhow::Result;

/// Quarter-turn rotation applied to an image on its way through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Rotation angle in degrees, clockwise.
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

/// Pixel layouts accepted from callers and produced by target readback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    /// Y plane followed by interleaved UV at half resolution.
    Nv12,
    /// Y plane followed by separate U and V planes at half resolution.
    I420,
}

impl PixelFormat {
    /// Bytes required to store a `width` x `height` image in this format.
    pub fn buffer_len(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => pixels * 4,
            PixelFormat::Nv12 | PixelFormat::I420 => pixels * 3 / 2,
        }
    }
}

/// An owned image handed to the pipeline or read back from the target.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps raw pixel data, checking it matches the declared geometry.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = format.buffer_len(width, height);
        if data.len() != expected {
            anyhow::bail!(
                "pixel data is {} bytes but {}x{} {:?} requires {}",
                data.len(),
                width,
                height,
                format,
                expected
            );
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the buffer, returning the raw bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Whether the engine has finished rendering the pushed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawStatus {
    /// The rendered result is available on the target.
    Ready,
    /// The engine needs another draw attempt before the result is usable.
    Pending,
}

/// Player run state as seen by the frame pipeline.
///
/// Paused and stopped both gate new processing and break an in-progress
/// draw wait; they differ only in intent (resume versus teardown).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
    Stopped,
}

impl RunState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            RunState::Running => 0,
            RunState::Paused => 1,
            RunState::Stopped => 2,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => RunState::Running,
            1 => RunState::Paused,
            _ => RunState::Stopped,
        }
    }
}
