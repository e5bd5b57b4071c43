use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use ndarray::Array2;
use rayon::prelude::*;

/// Luma below which a pixel reads as a dark module.
pub const DARK_THRESHOLD: u8 = 128;

/// Per-pixel dark/light pattern of the working bitmap, indexed `[[y, x]]`.
///
/// Recolor paints from this instead of the pixels, so an earlier recolor to a
/// light shade cannot make the pattern disappear.
pub type DarkMask = Array2<bool>;

/// One step of the decoration chain, applied in the order it was added.
#[derive(Clone, Debug)]
pub enum Decoration {
    /// Paints dark pixels `dark` and, when given, light pixels `light`.
    /// Leaves the dark/light pattern itself untouched.
    Recolor {
        dark: Rgba<u8>,
        light: Option<Rgba<u8>>,
    },
    /// Alpha-blends an image over the centre of the code.
    Overlay(Overlay),
}

#[derive(Clone, Debug)]
pub struct Overlay {
    pub image: RgbaImage,
    /// Fraction of the canvas' width and height the image may occupy.
    pub scale: f32,
    /// Multiplier applied to the image's own alpha.
    pub opacity: f32,
    /// Largest fraction of modules this overlay may flip.
    pub max_loss: f32,
}

impl Decoration {
    pub fn recolor(dark: Rgba<u8>) -> Self {
        Decoration::Recolor { dark, light: None }
    }

    pub fn recolor_with_background(dark: Rgba<u8>, light: Rgba<u8>) -> Self {
        Decoration::Recolor {
            dark,
            light: Some(light),
        }
    }

    pub fn overlay(image: RgbaImage, scale: f32, opacity: f32) -> Self {
        Self::overlay_within(image, scale, opacity, 1.0)
    }

    pub fn overlay_within(image: RgbaImage, scale: f32, opacity: f32, max_loss: f32) -> Self {
        Decoration::Overlay(Overlay {
            image,
            scale,
            opacity,
            max_loss,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Decoration::Recolor { .. } => "recolor",
            Decoration::Overlay(_) => "overlay",
        }
    }

    /// Whether this step can change which pixels read as dark, and therefore
    /// has to pass the scannability check.
    pub fn is_structural(&self) -> bool {
        matches!(self, Decoration::Overlay(_))
    }

    pub fn loss_budget(&self) -> f32 {
        match self {
            Decoration::Recolor { .. } => 0.0,
            Decoration::Overlay(overlay) => overlay.max_loss,
        }
    }

    /// Returns a decorated copy; `bitmap` is left as it was. `mask` is the
    /// dark/light pattern `bitmap` stands for.
    pub fn apply(&self, bitmap: &RgbaImage, mask: &DarkMask) -> RgbaImage {
        match self {
            Decoration::Recolor { dark, light } => recolor(bitmap, mask, *dark, *light),
            Decoration::Overlay(overlay) => composite(bitmap, overlay),
        }
    }
}

/// Luma of `px` as it would look printed on white paper.
pub fn luma_on_white(px: &Rgba<u8>) -> u8 {
    let [r, g, b, a] = px.0;
    let alpha = a as f32 / 255.0;
    let flatten = |c: u8| c as f32 * alpha + 255.0 * (1.0 - alpha);
    let luma = 0.2126 * flatten(r) + 0.7152 * flatten(g) + 0.0722 * flatten(b);
    luma.round().clamp(0.0, 255.0) as u8
}

pub fn is_dark(px: &Rgba<u8>) -> bool {
    luma_on_white(px) < DARK_THRESHOLD
}

/// Dark/light pattern read straight off the pixels.
pub fn dark_mask(bitmap: &RgbaImage) -> DarkMask {
    let (width, height) = bitmap.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        is_dark(bitmap.get_pixel(x as u32, y as u32))
    })
}

/// Pattern after `before` became `after`: pixels the step left alone keep
/// their old reading, changed pixels are read afresh.
pub fn remask(mask: &DarkMask, before: &RgbaImage, after: &RgbaImage) -> DarkMask {
    Array2::from_shape_fn(mask.dim(), |(y, x)| {
        let (px, py) = (x as u32, y as u32);
        let new = after.get_pixel(px, py);
        if before.get_pixel(px, py) == new {
            mask[[y, x]]
        } else {
            is_dark(new)
        }
    })
}

fn recolor(
    bitmap: &RgbaImage,
    mask: &DarkMask,
    dark: Rgba<u8>,
    light: Option<Rgba<u8>>,
) -> RgbaImage {
    let width = bitmap.width() as usize;
    let mut out = bitmap.clone();
    let raw: &mut [u8] = &mut out;

    raw.par_chunks_exact_mut(4).enumerate().for_each(|(i, px)| {
        let is_dark_module = match mask.get((i / width, i % width)) {
            Some(&marked) => marked,
            None => is_dark(&Rgba([px[0], px[1], px[2], px[3]])),
        };
        if is_dark_module {
            px.copy_from_slice(&dark.0);
        } else if let Some(light) = light {
            px.copy_from_slice(&light.0);
        }
    });

    out
}

fn composite(bitmap: &RgbaImage, overlay: &Overlay) -> RgbaImage {
    let (width, height) = bitmap.dimensions();
    let (src_w, src_h) = overlay.image.dimensions();
    if src_w == 0 || src_h == 0 {
        return bitmap.clone();
    }

    let scale = clamp_scale(overlay.scale);
    let box_w = ((width as f32 * scale).round() as u32).clamp(1, width);
    let box_h = ((height as f32 * scale).round() as u32).clamp(1, height);

    // Fit inside the box, keeping the image's aspect ratio.
    let fit = (box_w as f32 / src_w as f32).min(box_h as f32 / src_h as f32);
    let logo_w = ((src_w as f32 * fit).round() as u32).clamp(1, box_w);
    let logo_h = ((src_h as f32 * fit).round() as u32).clamp(1, box_h);

    let mut logo = imageops::resize(&overlay.image, logo_w, logo_h, FilterType::Lanczos3);
    let opacity = clamp_opacity(overlay.opacity);
    let raw: &mut [u8] = &mut logo;
    raw.par_chunks_exact_mut(4)
        .for_each(|px| px[3] = (px[3] as f32 * opacity).round() as u8);

    let x = (width - logo_w) / 2;
    let y = (height - logo_h) / 2;
    tracing::debug!(logo_w, logo_h, x, y, opacity, "compositing overlay");

    let mut out = bitmap.clone();
    imageops::overlay(&mut out, &logo, x as i64, y as i64);
    out
}

fn clamp_scale(scale: f32) -> f32 {
    if scale.is_nan() {
        return 1.0;
    }
    scale.clamp(f32::MIN_POSITIVE, 1.0)
}

fn clamp_opacity(opacity: f32) -> f32 {
    if opacity.is_nan() {
        return 0.0;
    }
    opacity.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn checkerboard(size: u32) -> RgbaImage {
        ImageBuffer::from_fn(size, size, |x, y| if (x + y) % 2 == 0 { BLACK } else { WHITE })
    }

    fn solid(w: u32, h: u32, px: Rgba<u8>) -> RgbaImage {
        ImageBuffer::from_pixel(w, h, px)
    }

    fn paint(step: &Decoration, base: &RgbaImage) -> RgbaImage {
        step.apply(base, &dark_mask(base))
    }

    #[test]
    fn transparent_pixels_read_as_light() {
        assert!(!is_dark(&Rgba([0, 0, 0, 0])));
        assert!(is_dark(&Rgba([0, 0, 0, 255])));
        assert!(is_dark(&RED));
    }

    #[test]
    fn recolor_keeps_the_pattern() {
        let base = checkerboard(8);
        let out = paint(&Decoration::recolor(RED), &base);

        for (x, y, px) in out.enumerate_pixels() {
            let expected = if (x + y) % 2 == 0 { RED } else { WHITE };
            assert_eq!(*px, expected, "pixel ({x}, {y})");
        }
    }

    #[test]
    fn second_recolor_follows_the_pattern_not_the_pixels() {
        let base = checkerboard(8);
        let mask = dark_mask(&base);
        let orange = Rgba([255, 165, 0, 255]);
        let navy = Rgba([0, 0, 128, 255]);
        let cream = Rgba([250, 250, 235, 255]);

        let first = Decoration::recolor(orange).apply(&base, &mask);
        assert!(!is_dark(&orange));
        let second = Decoration::recolor_with_background(navy, cream).apply(&first, &mask);

        for (x, y, px) in second.enumerate_pixels() {
            let expected = if (x + y) % 2 == 0 { navy } else { cream };
            assert_eq!(*px, expected, "pixel ({x}, {y})");
        }
    }

    #[test]
    fn remask_reads_only_changed_pixels() {
        let base = checkerboard(10);
        let mask = dark_mask(&base);
        let light_dark = Decoration::recolor(Rgba([255, 200, 0, 255])).apply(&base, &mask);
        // Recolor changes pixels but not the pattern it painted from.
        assert_ne!(dark_mask(&light_dark), mask);

        let covered = paint(&Decoration::overlay(solid(2, 2, BLACK), 0.2, 1.0), &light_dark);
        let after = remask(&mask, &light_dark, &covered);
        for y in 0..10 {
            for x in 0..10 {
                let inside = (4..6).contains(&x) && (4..6).contains(&y);
                let expected = inside || mask[[y, x]];
                assert_eq!(after[[y, x]], expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn recolor_paints_background_when_asked() {
        let background = Rgba([255, 255, 200, 255]);
        let out = paint(&Decoration::recolor_with_background(RED, background), &checkerboard(4));
        assert_eq!(*out.get_pixel(0, 0), RED);
        assert_eq!(*out.get_pixel(1, 0), background);
    }

    #[test]
    fn apply_does_not_touch_its_input() {
        let base = checkerboard(6);
        let before = base.clone();
        let _ = paint(&Decoration::recolor(RED), &base);
        let _ = paint(&Decoration::overlay(solid(2, 2, BLACK), 0.5, 1.0), &base);
        assert_eq!(base, before);
    }

    #[test]
    fn overlay_is_centred_and_sized_by_scale() {
        let base = solid(100, 100, WHITE);
        let out = paint(&Decoration::overlay(solid(10, 10, BLACK), 0.2, 1.0), &base);

        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(*out.get_pixel(40, 40), BLACK);
        assert_eq!(*out.get_pixel(59, 59), BLACK);
        assert_eq!(*out.get_pixel(39, 50), WHITE);
        assert_eq!(*out.get_pixel(60, 50), WHITE);
    }

    #[test]
    fn overlay_keeps_aspect_ratio() {
        let base = solid(100, 100, WHITE);
        let out = paint(&Decoration::overlay(solid(20, 10, BLACK), 0.4, 1.0), &base);

        // 40x20 box centred at (30, 40).
        assert_eq!(*out.get_pixel(30, 40), BLACK);
        assert_eq!(*out.get_pixel(69, 59), BLACK);
        assert_eq!(*out.get_pixel(50, 39), WHITE);
        assert_eq!(*out.get_pixel(50, 60), WHITE);
    }

    #[test]
    fn zero_opacity_changes_nothing() {
        let base = checkerboard(20);
        let out = paint(&Decoration::overlay(solid(5, 5, RED), 0.5, 0.0), &base);
        assert_eq!(out, base);
    }

    #[test]
    fn half_opacity_blends() {
        let base = solid(10, 10, WHITE);
        let out = paint(&Decoration::overlay(solid(10, 10, BLACK), 1.0, 0.5), &base);
        let px = out.get_pixel(5, 5);
        assert!((120..=135).contains(&px[0]), "got {px:?}");
    }

    #[test]
    fn out_of_range_scale_is_clamped() {
        let base = solid(10, 10, WHITE);
        let out = paint(&Decoration::overlay(solid(4, 4, BLACK), 3.0, 1.0), &base);
        assert!(out.pixels().all(|px| *px == BLACK));

        let out = paint(&Decoration::overlay(solid(4, 4, BLACK), -1.0, 1.0), &base);
        assert_eq!(out.pixels().filter(|px| **px == BLACK).count(), 1);
    }

    #[test]
    fn overlay_then_recolor_differs_from_recolor_then_overlay() {
        let base = checkerboard(20);
        let logo = solid(4, 4, Rgba([0, 0, 255, 255]));
        let overlay = Decoration::overlay(logo, 0.5, 1.0);
        let recolor = Decoration::recolor(RED);

        let a = paint(&recolor, &paint(&overlay, &base));
        let b = paint(&overlay, &paint(&recolor, &base));
        assert_ne!(a, b);
    }

    #[test]
    fn only_overlays_are_structural() {
        assert!(!Decoration::recolor(RED).is_structural());
        assert_eq!(Decoration::recolor(RED).loss_budget(), 0.0);

        let overlay = Decoration::overlay_within(solid(1, 1, BLACK), 0.2, 1.0, 0.1);
        assert!(overlay.is_structural());
        assert_eq!(overlay.loss_budget(), 0.1);
    }
}
