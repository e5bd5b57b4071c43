use crate::error::{EncodingError, Error, Result};
use image::{ImageBuffer, Rgba, RgbaImage};
use ndarray::Array2;
use qrcode::{EcLevel, QrCode};

pub const DARK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Knobs handed to the external encoder.
#[derive(Clone, Copy, Debug)]
pub struct EncodeOptions {
    pub ec_level: EcLevel,
    /// Light border around the symbol, in modules.
    pub quiet_zone: u32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            ec_level: EcLevel::H,
            quiet_zone: 4,
        }
    }
}

/// Where the symbol's modules landed inside the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymbolLayout {
    pub modules: usize,
    pub module_px: u32,
    pub origin_x: u32,
    pub origin_y: u32,
}

impl SymbolLayout {
    /// Pixel at the centre of module (`mx`, `my`).
    pub fn module_center(&self, mx: usize, my: usize) -> (u32, u32) {
        let half = self.module_px / 2;
        (
            self.origin_x + mx as u32 * self.module_px + half,
            self.origin_y + my as u32 * self.module_px + half,
        )
    }
}

/// Freshly encoded code: the raw black/white canvas plus its geometry.
#[derive(Clone, Debug)]
pub struct Encoded {
    pub bitmap: RgbaImage,
    pub layout: SymbolLayout,
}

pub fn check_size(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidSize { width, height });
    }
    Ok(())
}

pub fn generate_modules(text: &str, ec_level: EcLevel) -> Result<Array2<bool>> {
    let code = QrCode::with_error_correction_level(text, ec_level).map_err(EncodingError::from)?;

    let width = code.width();
    let colors = code.to_colors();

    tracing::debug!(version = ?code.version(), modules = width, "generated QR symbol");

    Ok(Array2::from_shape_fn((width, width), |(y, x)| {
        matches!(colors[y * width + x], qrcode::Color::Dark)
    }))
}

/// Encodes `text` into a `width` x `height` black/white bitmap.
///
/// The symbol is scaled by the largest whole number of pixels per module that
/// fits it (quiet zone included) into the shorter side, then centred. The
/// canvas is never grown past the requested size; a symbol that does not fit
/// at one pixel per module is an [`EncodingError::DoesNotFit`].
pub fn encode(text: &str, width: u32, height: u32, options: EncodeOptions) -> Result<Encoded> {
    check_size(width, height)?;

    let modules = generate_modules(text, options.ec_level)?;
    let side = modules.nrows();
    let required = side as u32 + 2 * options.quiet_zone;
    let module_px = width.min(height) / required;
    if module_px == 0 {
        return Err(EncodingError::DoesNotFit {
            width,
            height,
            required,
        }
        .into());
    }

    let symbol_px = side as u32 * module_px;
    let layout = SymbolLayout {
        modules: side,
        module_px,
        origin_x: (width - symbol_px) / 2,
        origin_y: (height - symbol_px) / 2,
    };
    tracing::debug!(?layout, width, height, "placing symbol");

    let bitmap = ImageBuffer::from_fn(width, height, |x, y| {
        match module_at(&layout, x, y) {
            Some((mx, my)) if modules[[my, mx]] => DARK,
            _ => LIGHT,
        }
    });

    Ok(Encoded { bitmap, layout })
}

fn module_at(layout: &SymbolLayout, x: u32, y: u32) -> Option<(usize, usize)> {
    let span = layout.modules as u32 * layout.module_px;
    if x < layout.origin_x || y < layout.origin_y {
        return None;
    }
    let (dx, dy) = (x - layout.origin_x, y - layout.origin_y);
    if dx >= span || dy >= span {
        return None;
    }
    Some((
        (dx / layout.module_px) as usize,
        (dy / layout.module_px) as usize,
    ))
}
