use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use player::Rotation;

#[derive(Parser, Debug)]
#[command(
    name = "fxpreview",
    author,
    version,
    about = "Offscreen effect player preview harness",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Number of synthetic frames to push through the player.
    #[arg(long, default_value_t = 60)]
    pub frames: u32,

    /// Frame size in physical pixels (e.g. `640x360`).
    #[arg(long, value_name = "WIDTHxHEIGHT", default_value = "640x360")]
    pub size: String,

    /// Delay between submitted frames.
    #[arg(
        long,
        value_name = "DURATION",
        value_parser = humantime::parse_duration,
        default_value = "5ms"
    )]
    pub frame_interval: Duration,

    /// Rotation of the source frames as they arrive.
    #[arg(long, value_enum, default_value = "deg0")]
    pub rotation: RotationArg,

    /// Orientation applied to the processed result (defaults to none).
    #[arg(long, value_enum)]
    pub orient: Option<RotationArg>,

    /// Mirror source frames horizontally before processing.
    #[arg(long)]
    pub mirror: bool,

    /// Strength of the built-in tint effect, in percent.
    #[arg(long, value_name = "PERCENT", default_value_t = 35)]
    pub tint: u8,

    /// TOML file overriding the player tuning defaults.
    #[arg(long, value_name = "FILE")]
    pub tuning: Option<PathBuf>,

    /// Write the last processed frame to this PNG path.
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,

    /// Print run statistics as JSON instead of the human summary.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RotationArg {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl From<RotationArg> for Rotation {
    fn from(value: RotationArg) -> Self {
        match value {
            RotationArg::Deg0 => Rotation::Deg0,
            RotationArg::Deg90 => Rotation::Deg90,
            RotationArg::Deg180 => Rotation::Deg180,
            RotationArg::Deg270 => Rotation::Deg270,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
