use crate::decorate::{dark_mask, remask, DarkMask, Decoration};
use crate::error::Result;
use crate::guard::ScanGuard;
use crate::qr::{check_size, encode, EncodeOptions, SymbolLayout};
use image::RgbaImage;
use qrcode::EcLevel;

/// Fresh builder; only [`QrBuilder::with_size`] is available.
#[derive(Debug, Default)]
pub struct New;

/// Canvas size chosen, waiting for a payload.
#[derive(Debug)]
pub struct SizeSet {
    width: u32,
    height: u32,
    options: EncodeOptions,
}

/// Payload encoded; decorations may be stacked and the image taken.
#[derive(Debug)]
pub struct DataSet {
    bitmap: RgbaImage,
    mask: DarkMask,
    guard: ScanGuard,
    decorations: usize,
}

/// Single-use QR code builder. Each state only exposes the steps that are
/// legal from it, so e.g. decorating before encoding does not compile.
#[derive(Debug)]
pub struct QrBuilder<S> {
    state: S,
}

pub fn new_qr_code() -> QrBuilder<New> {
    QrBuilder { state: New }
}

impl Default for QrBuilder<New> {
    fn default() -> Self {
        new_qr_code()
    }
}

impl QrBuilder<New> {
    pub fn with_size(self, width: u32, height: u32) -> Result<QrBuilder<SizeSet>> {
        check_size(width, height)?;
        Ok(QrBuilder {
            state: SizeSet {
                width,
                height,
                options: EncodeOptions::default(),
            },
        })
    }
}

impl QrBuilder<SizeSet> {
    pub fn with_error_correction(mut self, ec_level: EcLevel) -> Self {
        self.state.options.ec_level = ec_level;
        self
    }

    pub fn with_quiet_zone(mut self, modules: u32) -> Self {
        self.state.options.quiet_zone = modules;
        self
    }

    pub fn with_data(self, payload: &str) -> Result<QrBuilder<DataSet>> {
        let SizeSet {
            width,
            height,
            options,
        } = self.state;
        let encoded = encode(payload, width, height, options)?;
        tracing::debug!(
            width,
            height,
            ec_level = ?options.ec_level,
            payload_len = payload.len(),
            "encoded payload"
        );

        Ok(QrBuilder {
            state: DataSet {
                guard: ScanGuard::new(payload, encoded.layout),
                mask: dark_mask(&encoded.bitmap),
                bitmap: encoded.bitmap,
                decorations: 0,
            },
        })
    }
}

impl QrBuilder<DataSet> {
    /// Applies one decoration on top of everything applied so far.
    ///
    /// Overlays are only kept if the result still decodes to the original
    /// payload within the step's loss budget; otherwise the whole build is
    /// abandoned with [`crate::Error::UnreadableData`].
    pub fn decorate(self, decoration: Decoration) -> Result<Self> {
        let DataSet {
            bitmap,
            mask,
            guard,
            decorations,
        } = self.state;

        let decorated = decoration.apply(&bitmap, &mask);
        let mask = if decoration.is_structural() {
            let after = remask(&mask, &bitmap, &decorated);
            guard.admit(&decoration, &mask, &after, &decorated)?;
            after
        } else {
            mask
        };
        tracing::debug!(
            step = decorations + 1,
            decoration = decoration.name(),
            "decoration applied"
        );

        Ok(QrBuilder {
            state: DataSet {
                bitmap: decorated,
                mask,
                guard,
                decorations: decorations + 1,
            },
        })
    }

    pub fn payload(&self) -> &str {
        self.state.guard.expected()
    }

    pub fn layout(&self) -> SymbolLayout {
        self.state.guard.layout()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.state.bitmap
    }

    pub fn to_image(self) -> RgbaImage {
        self.state.bitmap
    }
}
