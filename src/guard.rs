//! Scannability check for decorations that can flip modules.
//!
//! Instead of estimating how much error-correction headroom an overlay eats,
//! the decorated bitmap is run through a real decoder and must come back with
//! the exact payload that was encoded.

use crate::decorate::{luma_on_white, DarkMask, Decoration};
use crate::error::{DecodeFailure, Error, Result, Unreadable};
use crate::qr::SymbolLayout;
use image::RgbaImage;
use rayon::prelude::*;

/// Decodes the first QR symbol found in `bitmap`.
///
/// Transparent areas are treated as white, as they would be when printed.
pub fn decode(bitmap: &RgbaImage) -> std::result::Result<String, DecodeFailure> {
    let (width, height) = bitmap.dimensions();
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            luma_on_white(bitmap.get_pixel(x as u32, y as u32))
        });

    let grids = prepared.detect_grids();
    let grid = grids.first().ok_or(DecodeFailure::NoSymbol)?;
    let (_meta, content) = grid.decode().map_err(DecodeFailure::Corrupt)?;
    tracing::trace!(bytes = content.len(), "decoded symbol");

    Ok(content)
}

#[derive(Clone, Debug, PartialEq)]
pub enum ScanAssessment {
    Readable { payload: String, loss: f32 },
    Unreadable(Unreadable),
}

/// Knows what the code is supposed to say and where its modules are.
#[derive(Clone, Debug)]
pub struct ScanGuard {
    expected: String,
    layout: SymbolLayout,
}

impl ScanGuard {
    pub fn new(expected: impl Into<String>, layout: SymbolLayout) -> Self {
        Self {
            expected: expected.into(),
            layout,
        }
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }

    pub fn layout(&self) -> SymbolLayout {
        self.layout
    }

    #[tracing::instrument(level = "debug", skip_all, fields(expected_len = self.expected.len()))]
    pub fn assess_overlay(
        &self,
        before: &DarkMask,
        after: &DarkMask,
        decorated: &RgbaImage,
    ) -> ScanAssessment {
        let payload = match decode(decorated) {
            Ok(payload) => payload,
            Err(failure) => return ScanAssessment::Unreadable(failure.into()),
        };
        if payload != self.expected {
            return ScanAssessment::Unreadable(Unreadable::PayloadMismatch { decoded: payload });
        }

        let loss = structural_loss(&self.layout, before, after);
        tracing::debug!(loss, "overlay still decodes");
        ScanAssessment::Readable { payload, loss }
    }

    /// Accepts `decorated` as the next working bitmap or says why not.
    pub fn admit(
        &self,
        decoration: &Decoration,
        before: &DarkMask,
        after: &DarkMask,
        decorated: &RgbaImage,
    ) -> Result<()> {
        let reason = match self.assess_overlay(before, after, decorated) {
            ScanAssessment::Readable { loss, .. } => {
                let budget = decoration.loss_budget();
                if loss <= budget {
                    return Ok(());
                }
                Unreadable::LossBudgetExceeded { loss, budget }
            }
            ScanAssessment::Unreadable(reason) => reason,
        };

        tracing::warn!(decoration = decoration.name(), %reason, "rejecting decoration");
        Err(Error::UnreadableData { reason })
    }
}

/// Fraction of modules whose centre pixel switched between dark and light.
pub fn structural_loss(layout: &SymbolLayout, before: &DarkMask, after: &DarkMask) -> f32 {
    let n = layout.modules;
    if n == 0 {
        return 0.0;
    }

    let flipped = (0..n * n)
        .into_par_iter()
        .filter(|i| {
            let (x, y) = layout.module_center(i % n, i / n);
            let at = [y as usize, x as usize];
            before.get(at) != after.get(at)
        })
        .count();

    flipped as f32 / (n * n) as f32
}
