//! Offscreen effect player core.
//!
//! The crate glues arbitrary caller threads to a single render worker thread
//! that owns the GPU context. Callers enqueue processing requests and control
//! commands; the worker executes them strictly in submission order against
//! the external effect engine and render target. The overall flow is:
//!
//! ```text
//!   caller threads                       render worker (scheduler crate)
//!        │ process_frame / commands             │
//!        ▼                                      ▼
//!   OffscreenPlayer ──▶ RenderScheduler ──▶ lock frame ─▶ push ─▶ draw loop
//!        ▲                                      │
//!        │    callback(Some(frame) / None) ◀────┘ orient ─▶ unlock
//! ```
//!
//! The effect computation and GPU drawing themselves live behind the
//! [`EffectEngine`] and [`RenderTarget`] traits; this crate owns only the
//! scheduling, backpressure, and lifecycle discipline around them: at most
//! one pass touches the shared [`ProcessedFrame`] at a time, caller bursts
//! are bounded by a queue ceiling, and teardown never touches a destroyed
//! context.

mod config;
mod engine;
mod frame;
mod player;
mod types;

pub use config::{ConfigError, PlayerTuning};
pub use engine::{EffectEngine, EvalCallback, ProcessCallback, RenderTarget};
pub use frame::ProcessedFrame;
pub use player::{OffscreenPlayer, PlayerError};
pub use types::{DrawStatus, PixelBuffer, PixelFormat, Rotation, RunState};
