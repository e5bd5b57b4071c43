mod args;

use anyhow::{Context, Result};
use args::{parse_color, Args};
use clap::Parser;
use decorated_qr::{new_qr_code, Decoration};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Generating QR code for: {}", args.text);
    let mut builder = new_qr_code()
        .with_size(args.width, args.height)?
        .with_error_correction(args.error_correction.into())
        .with_quiet_zone(args.quiet_zone)
        .with_data(&args.text)?;

    if let Some(path) = &args.overlay {
        info!("Loading image: {}", path.display());
        let logo = image::open(path)
            .with_context(|| format!("Failed to open overlay {}", path.display()))?
            .to_rgba8();
        builder = builder
            .decorate(Decoration::overlay(logo, args.scale, args.opacity))
            .context("Overlay makes the code unreadable; try a smaller scale or opacity")?;
    }

    if args.color.is_some() || args.background.is_some() {
        let dark = match &args.color {
            Some(hex) => parse_color(hex)?,
            None => decorated_qr::qr::DARK,
        };
        let step = match &args.background {
            Some(hex) => Decoration::recolor_with_background(dark, parse_color(hex)?),
            None => Decoration::recolor(dark),
        };
        builder = builder.decorate(step)?;
    }

    let output_img = builder.to_image();
    output_img
        .save(&args.output)
        .with_context(|| format!("Failed to save {}", args.output.display()))?;

    info!("Saved to: {}", args.output.display());
    Ok(())
}
