use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use decorated_qr::EcLevel;
use image::Rgba;
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Debug)]
#[clap(rename_all = "UPPER")]
pub enum EcArg {
    L,
    M,
    Q,
    H,
}

impl From<EcArg> for EcLevel {
    fn from(v: EcArg) -> Self {
        match v {
            EcArg::L => EcLevel::L,
            EcArg::M => EcLevel::M,
            EcArg::Q => EcLevel::Q,
            EcArg::H => EcLevel::H,
        }
    }
}

#[derive(Parser)]
#[command(name = "decorated-qr")]
#[command(about = "Generate QR codes with a custom color and logo overlay that still scan")]
pub struct Args {
    /// Text to encode in the QR code
    #[arg(short, long)]
    pub text: String,

    /// Output image path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Output width in pixels (default: 250)
    #[arg(short = 'W', long, default_value = "250")]
    pub width: u32,

    /// Output height in pixels (default: 250)
    #[arg(short = 'H', long, default_value = "250")]
    pub height: u32,

    /// QR code error correction level (L, M, Q, H)
    #[arg(short = 'e', long, default_value = "H")]
    pub error_correction: EcArg,

    /// Quiet zone around the symbol, in modules (default: 4)
    #[arg(short, long, default_value = "4")]
    pub quiet_zone: u32,

    /// Color for dark modules as RRGGBB
    #[arg(short, long)]
    pub color: Option<String>,

    /// Color for light modules as RRGGBB (default: keep white)
    #[arg(short, long)]
    pub background: Option<String>,

    /// Logo image to place in the centre
    #[arg(short = 'i', long)]
    pub overlay: Option<PathBuf>,

    /// Logo size as a fraction of the output size (default: 0.2)
    #[arg(short, long, default_value = "0.2")]
    pub scale: f32,

    /// Logo opacity between 0 and 1 (default: 1.0)
    #[arg(short = 'p', long, default_value = "1.0")]
    pub opacity: f32,
}

pub fn parse_color(hex: &str) -> Result<Rgba<u8>> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        bail!("Color must be six hex digits, got {hex:?}");
    }

    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .with_context(|| format!("Invalid hex digits in color {hex:?}"))
    };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}
