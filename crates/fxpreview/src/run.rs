use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::unbounded;
use player::{OffscreenPlayer, PixelBuffer, PixelFormat, PlayerTuning, ProcessCallback};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::software::{SoftwareTarget, TintEngine};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[derive(Debug, Serialize)]
struct RunStats {
    submitted: u32,
    accepted: u32,
    rejected: u32,
    rendered: u32,
    dropped: u32,
    elapsed_ms: u64,
}

enum Outcome {
    Rendered(PixelBuffer),
    Dropped,
}

pub fn run(cli: Cli) -> Result<()> {
    let (width, height) = parse_surface_size(&cli.size)?;
    let tuning = load_tuning(cli.tuning.as_deref())?;

    let target = SoftwareTarget::new();
    let engine = Arc::new(TintEngine::new(target.clone(), cli.tint));
    let mut player = OffscreenPlayer::new(engine, target, width, height, tuning)
        .context("failed to start offscreen player")?;
    player.load_effect("builtin://warm-tint");
    tracing::info!(width, height, frames = cli.frames, "starting preview run");

    let (outcome_tx, outcome_rx) = unbounded();
    let started = Instant::now();
    let mut accepted = 0u32;
    let mut rejected = 0u32;
    for index in 0..cli.frames {
        let image = synth_frame(width, height, index);
        let outcome_tx = outcome_tx.clone();
        let callback: ProcessCallback = Box::new(move |frame| {
            let outcome = match frame {
                Some(frame) => match frame.read_rgba() {
                    Ok(pixels) => Outcome::Rendered(pixels),
                    Err(err) => {
                        tracing::warn!(%err, "frame readback failed");
                        Outcome::Dropped
                    }
                },
                None => Outcome::Dropped,
            };
            let _ = outcome_tx.send(outcome);
        });
        if player.process_frame(
            image,
            cli.rotation.into(),
            cli.mirror,
            Some(callback),
            cli.orient.map(Into::into),
        ) {
            accepted += 1;
        } else {
            rejected += 1;
        }
        thread::sleep(cli.frame_interval);
    }

    // Every callback owns a sender clone; the stream ends once they have all
    // fired.
    drop(outcome_tx);
    let mut rendered = 0u32;
    let mut dropped = 0u32;
    let mut last_frame = None;
    for outcome in outcome_rx.iter() {
        match outcome {
            Outcome::Rendered(pixels) => {
                rendered += 1;
                last_frame = Some(pixels);
            }
            Outcome::Dropped => dropped += 1,
        }
    }

    player.shutdown().context("player shutdown failed")?;
    let stats = RunStats {
        submitted: cli.frames,
        accepted,
        rejected,
        rendered,
        dropped,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    if let Some(path) = &cli.export {
        let frame = last_frame
            .as_ref()
            .ok_or_else(|| anyhow!("no frame was rendered; nothing to export"))?;
        export_png(frame, path)?;
        tracing::info!(path = %path.display(), "exported last processed frame");
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!(
            "Rendered {}/{} frames ({} dropped, {} rejected) in {} ms",
            stats.rendered, stats.submitted, stats.dropped, stats.rejected, stats.elapsed_ms
        );
    }
    Ok(())
}

fn load_tuning(path: Option<&Path>) -> Result<PlayerTuning> {
    match path {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read tuning file at {}", path.display()))?;
            PlayerTuning::from_toml_str(&contents)
                .with_context(|| format!("invalid tuning file at {}", path.display()))
        }
        None => Ok(PlayerTuning::default()),
    }
}

fn parse_surface_size(spec: &str) -> Result<(u32, u32)> {
    let (width, height) = spec
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("expected WxH format, e.g. 640x360"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid width in size specification"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid height in size specification"))?;
    if width == 0 || height == 0 {
        anyhow::bail!("frame dimensions must be greater than zero");
    }
    Ok((width, height))
}

/// Builds a moving colour gradient so successive frames are distinguishable
/// in the exported image.
fn synth_frame(width: u32, height: u32, index: u32) -> PixelBuffer {
    let mut data = Vec::with_capacity(PixelFormat::Rgba8.buffer_len(width, height));
    for y in 0..height {
        for x in 0..width {
            data.push((x * 255 / width) as u8);
            data.push((y * 255 / height) as u8);
            data.push((index * 8 % 256) as u8);
            data.push(255);
        }
    }
    PixelBuffer::new(width, height, PixelFormat::Rgba8, data).expect("synthetic frame geometry")
}

fn export_png(frame: &PixelBuffer, path: &Path) -> Result<()> {
    let image =
        image::RgbaImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or_else(|| anyhow!("rendered frame has inconsistent geometry"))?;
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
