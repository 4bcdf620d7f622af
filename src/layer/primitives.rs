//! Raster primitives used by the compositor.
//!
//! Every function takes its inputs by reference and returns a fresh
//! [`RgbaImage`]; nothing here holds state. Alpha is straight (not
//! premultiplied) throughout.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use palette::Srgb;

use crate::icon::{RectPx, SizePx};

// ============================================================================
// Geometry
// ============================================================================

/// Bounding box of every pixel with non-zero alpha, or `None` if the image is
/// fully transparent.
pub fn content_bounds(image: &RgbaImage) -> Option<RectPx> {
    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0u32, 0u32);
    let mut found = false;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        found = true;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    found.then(|| RectPx::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

/// Crops to the smallest box holding every non-transparent pixel.
///
/// A fully transparent image is returned unchanged.
pub fn trim(image: &RgbaImage) -> RgbaImage {
    match content_bounds(image) {
        Some(rect) => imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image(),
        None => image.clone(),
    }
}

/// Scales to the largest size fitting inside `bounds` that keeps the aspect ratio.
pub fn resize_to_fit(image: &RgbaImage, bounds: SizePx) -> RgbaImage {
    let target = SizePx::new(image.width(), image.height()).fit_within(bounds);
    if target.width == 0 || target.height == 0 {
        return RgbaImage::new(bounds.width, bounds.height);
    }
    if target == SizePx::new(image.width(), image.height()) {
        return image.clone();
    }
    imageops::resize(image, target.width, target.height, FilterType::Lanczos3)
}

/// Fits the image inside `bounds`, then centers it on a transparent `canvas`.
pub fn resize_centered(image: &RgbaImage, bounds: SizePx, canvas: SizePx) -> RgbaImage {
    extend_with_offset(&resize_to_fit(image, bounds), canvas, 0)
}

/// Places the image on a transparent canvas, centered, then moved down by
/// `offset_y` pixels (negative moves up). Anything falling outside is clipped.
pub fn extend_with_offset(image: &RgbaImage, canvas: SizePx, offset_y: i32) -> RgbaImage {
    let mut out = RgbaImage::new(canvas.width, canvas.height);
    let x = (canvas.width as i64 - image.width() as i64).div_euclid(2);
    let y = (canvas.height as i64 - image.height() as i64).div_euclid(2) + offset_y as i64;
    blit(&mut out, image, x, y);
    out
}

/// Moves the content vertically within the same canvas, clipping what falls off.
pub fn shift_vertical(image: &RgbaImage, offset_y: i32) -> RgbaImage {
    if offset_y == 0 {
        return image.clone();
    }
    let mut out = RgbaImage::new(image.width(), image.height());
    blit(&mut out, image, 0, offset_y as i64);
    out
}

/// Copies `src` into `dest` at `(x, y)`, replacing pixels, clipped to `dest`.
fn blit(dest: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64) {
    let (dw, dh) = (dest.width() as i64, dest.height() as i64);
    for (sx, sy, pixel) in src.enumerate_pixels() {
        let dx = x + sx as i64;
        let dy = y + sy as i64;
        if dx < 0 || dy < 0 || dx >= dw || dy >= dh {
            continue;
        }
        dest.put_pixel(dx as u32, dy as u32, *pixel);
    }
}

// ============================================================================
// Color
// ============================================================================

/// Replaces every pixel's RGB with `color`, keeping alpha exactly.
pub fn colorize(image: &RgbaImage, color: Srgb<u8>) -> RgbaImage {
    let mut result = image.clone();
    for pixel in result.pixels_mut() {
        pixel.0 = [color.red, color.green, color.blue, pixel[3]];
    }
    result
}

/// Multiplies the alpha channel by `factor` (clamped to `[0, 1]`).
pub fn alpha_scale(image: &RgbaImage, factor: f32) -> RgbaImage {
    let factor = factor.clamp(0.0, 1.0);
    let mut result = image.clone();
    for pixel in result.pixels_mut() {
        pixel[3] = (pixel[3] as f32 * factor).round() as u8;
    }
    result
}

// ============================================================================
// Blur
// ============================================================================

/// One-sided vertical motion blur followed by a vertical shift.
///
/// Each output pixel averages the column above it with Gaussian weights of
/// standard deviation `radius`, so content smears downward. The result is
/// then moved by `offset_y` on the same canvas. A radius of zero only shifts.
pub fn directional_blur(image: &RgbaImage, radius: u32, offset_y: i32) -> RgbaImage {
    let blurred = if radius == 0 {
        image.clone()
    } else {
        motion_blur_down(image, radius as f32)
    };
    shift_vertical(&blurred, offset_y)
}

fn motion_kernel(sigma: f32) -> Vec<f32> {
    let taps = (3.0 * sigma).ceil() as usize + 1;
    let weights: Vec<f32> = (0..taps)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

fn motion_blur_down(image: &RgbaImage, sigma: f32) -> RgbaImage {
    let kernel = motion_kernel(sigma);
    let (width, height) = image.dimensions();
    let mut out = RgbaImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let mut rgb = [0f32; 3];
            let mut alpha = 0f32;
            for (i, weight) in kernel.iter().enumerate() {
                // Rows above the top edge repeat the edge row.
                let sy = y.saturating_sub(i as u32);
                let p = image.get_pixel(x, sy);
                let a = p[3] as f32 / 255.0;
                for c in 0..3 {
                    rgb[c] += weight * a * p[c] as f32;
                }
                alpha += weight * a;
            }
            let pixel = if alpha > 0.0 {
                Rgba([
                    (rgb[0] / alpha).round().min(255.0) as u8,
                    (rgb[1] / alpha).round().min(255.0) as u8,
                    (rgb[2] / alpha).round().min(255.0) as u8,
                    (alpha * 255.0).round().min(255.0) as u8,
                ])
            } else {
                Rgba([0, 0, 0, 0])
            };
            out.put_pixel(x, y, pixel);
        }
    }

    out
}

// ============================================================================
// Compositing
// ============================================================================

/// Porter-Duff style operator for [`composite`].
///
/// "Destination" is the image being modified; "source" is the one laid on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompositeMode {
    /// Source color, kept only where the destination is opaque.
    SourceIn,
    /// Destination kept only where the source is opaque.
    DestinationIn,
    /// Destination kept only where the source is transparent.
    DestinationOut,
    /// Source alpha scaled by the given fraction, then laid over the destination.
    Dissolve(f32),
}

impl CompositeMode {
    /// Plain alpha-over.
    pub const OVER: CompositeMode = CompositeMode::Dissolve(1.0);
}

/// Combines `src` into `dest` in place. Both are aligned at the origin; only
/// the overlapping region is touched.
pub fn composite(dest: &mut RgbaImage, src: &RgbaImage, mode: CompositeMode) {
    let width = dest.width().min(src.width());
    let height = dest.height().min(src.height());

    for y in 0..height {
        for x in 0..width {
            let s = *src.get_pixel(x, y);
            let d = *dest.get_pixel(x, y);
            dest.put_pixel(x, y, composite_pixel(s, d, mode));
        }
    }
}

fn composite_pixel(src: Rgba<u8>, dst: Rgba<u8>, mode: CompositeMode) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let to_u8 = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;

    match mode {
        CompositeMode::SourceIn => Rgba([src[0], src[1], src[2], to_u8(sa * da)]),
        CompositeMode::DestinationIn => Rgba([dst[0], dst[1], dst[2], to_u8(da * sa)]),
        CompositeMode::DestinationOut => Rgba([dst[0], dst[1], dst[2], to_u8(da * (1.0 - sa))]),
        CompositeMode::Dissolve(opacity) => {
            let scaled = Rgba([src[0], src[1], src[2], to_u8(sa * opacity.clamp(0.0, 1.0))]);
            alpha_blend(scaled, dst)
        }
    }
}

/// Source-over blend of two straight-alpha pixels.
fn alpha_blend(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;

    let out_a = sa + da * (1.0 - sa);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |s: u8, d: u8| -> u8 {
        let out = (s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a;
        out.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend(src[0], dst[0]),
        blend(src[1], dst[1]),
        blend(src[2], dst[2]),
        (out_a * 255.0).round() as u8,
    ])
}

// ============================================================================
// Tests
// ============================================================================
