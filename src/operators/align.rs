//! MTB (median threshold bitmap) alignment.
//!
//! Handheld brackets drift by a few pixels between frames. MTB alignment
//! (Ward 2003, the algorithm behind the classic `AlignMTB` operator) finds
//! an integer translation per frame that is insensitive to the exposure
//! differences the bracket exists to capture: each frame is reduced to a
//! bitmap thresholded at its own grayscale *median*, so a short and a long
//! exposure of the same scene produce nearly identical bitmaps.
//!
//! The shift search is a coarse-to-fine pyramid: at each level the candidate
//! shift from the level below is doubled and the 3×3 neighborhood around it
//! is scored by counting XOR disagreements, masked by an exclusion bitmap
//! that blanks pixels too close to the median to be trustworthy.
//!
//! All frames align to the middle exposure, which typically has the fewest
//! clipped regions. The set is mutated in place; order and count are
//! preserved.

use image::RgbImage;

/// Pixels within this distance of the median are excluded from scoring.
const NOISE_MARGIN: i32 = 4;
/// Maximum pyramid depth: shifts up to ±2^6 pixels.
const MAX_LEVELS: u32 = 6;

/// A thresholded frame at one pyramid level.
struct Bitmap {
    width: u32,
    height: u32,
    /// 1 where gray > median
    threshold: Vec<u8>,
    /// 1 where |gray - median| > NOISE_MARGIN
    exclusion: Vec<u8>,
}

/// Grayscale reduction used for thresholding (integer Rec.601 luma).
fn grayscale(img: &RgbImage) -> Vec<u8> {
    img.pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            ((54 * r as u32 + 183 * g as u32 + 19 * b as u32) >> 8) as u8
        })
        .collect()
}

/// Median intensity via histogram.
fn median(gray: &[u8]) -> u8 {
    let mut hist = [0u32; 256];
    for &g in gray {
        hist[g as usize] += 1;
    }
    let half = (gray.len() as u32).div_ceil(2);
    let mut seen = 0;
    for (value, &count) in hist.iter().enumerate() {
        seen += count;
        if seen >= half {
            return value as u8;
        }
    }
    255
}

impl Bitmap {
    fn from_gray(gray: &[u8], width: u32, height: u32) -> Self {
        let med = median(gray) as i32;
        let mut threshold = Vec::with_capacity(gray.len());
        let mut exclusion = Vec::with_capacity(gray.len());
        for &g in gray {
            let g = g as i32;
            threshold.push((g > med) as u8);
            exclusion.push(((g - med).abs() > NOISE_MARGIN) as u8);
        }
        Self {
            width,
            height,
            threshold,
            exclusion,
        }
    }

    /// Half-resolution copy by 2×2 box averaging of the source grayscale.
    fn downsample_gray(gray: &[u8], width: u32, height: u32) -> (Vec<u8>, u32, u32) {
        let (dw, dh) = (width / 2, height / 2);
        let mut out = Vec::with_capacity((dw * dh) as usize);
        for y in 0..dh {
            for x in 0..dw {
                let idx = |dx: u32, dy: u32| ((y * 2 + dy) * width + x * 2 + dx) as usize;
                let sum = gray[idx(0, 0)] as u32
                    + gray[idx(1, 0)] as u32
                    + gray[idx(0, 1)] as u32
                    + gray[idx(1, 1)] as u32;
                out.push((sum / 4) as u8);
            }
        }
        (out, dw, dh)
    }

    #[inline]
    fn at(&self, x: i64, y: i64) -> Option<(u8, u8)> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        let i = (y * self.width as i64 + x) as usize;
        Some((self.threshold[i], self.exclusion[i]))
    }
}

/// Count of masked threshold disagreements between `a` and `b` shifted by
/// `(dx, dy)`. Out-of-frame pixels do not score.
fn shift_error(a: &Bitmap, b: &Bitmap, dx: i64, dy: i64) -> u64 {
    let mut err = 0u64;
    for y in 0..a.height as i64 {
        for x in 0..a.width as i64 {
            let i = (y * a.width as i64 + x) as usize;
            if a.exclusion[i] == 0 {
                continue;
            }
            if let Some((tb, eb)) = b.at(x - dx, y - dy)
                && eb != 0
            {
                err += (a.threshold[i] ^ tb) as u64;
            }
        }
    }
    err
}

/// Pyramid of bitmaps, finest level first.
fn build_pyramid(img: &RgbImage) -> Vec<Bitmap> {
    let mut levels = Vec::new();
    let mut gray = grayscale(img);
    let (mut w, mut h) = (img.width(), img.height());
    for _ in 0..=MAX_LEVELS {
        levels.push(Bitmap::from_gray(&gray, w, h));
        if w / 2 < 16 || h / 2 < 16 {
            break;
        }
        let (g, dw, dh) = Bitmap::downsample_gray(&gray, w, h);
        gray = g;
        w = dw;
        h = dh;
    }
    levels
}

/// Coarse-to-fine shift of `moving` onto `reference`.
fn calculate_shift(reference: &[Bitmap], moving: &[Bitmap]) -> (i64, i64) {
    let mut shift = (0i64, 0i64);
    // Coarsest first: each finer level doubles and refines by ±1.
    for level in (0..reference.len().min(moving.len())).rev() {
        let (rb, mb) = (&reference[level], &moving[level]);
        shift = (shift.0 * 2, shift.1 * 2);
        // Inherited shift scores first so a tie never introduces drift.
        let mut best = shift;
        let mut best_err = shift_error(rb, mb, shift.0, shift.1);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if (dx, dy) == (0, 0) {
                    continue;
                }
                let candidate = (shift.0 + dx, shift.1 + dy);
                let err = shift_error(rb, mb, candidate.0, candidate.1);
                if err < best_err {
                    best_err = err;
                    best = candidate;
                }
            }
        }
        shift = best;
    }
    shift
}

/// Translate `img` by `(dx, dy)`, clamping reads to the frame edge so no
/// black border enters the merge.
fn shift_image(img: &RgbImage, dx: i64, dy: i64) -> RgbImage {
    let (w, h) = (img.width(), img.height());
    RgbImage::from_fn(w, h, |x, y| {
        let sx = (x as i64 - dx).clamp(0, w as i64 - 1) as u32;
        let sy = (y as i64 - dy).clamp(0, h as i64 - 1) as u32;
        *img.get_pixel(sx, sy)
    })
}

/// Align every frame to the middle exposure, in place.
///
/// Returns the shift applied to each frame (reference frame gets (0, 0)).
pub fn align_images(images: &mut [RgbImage]) -> Vec<(i64, i64)> {
    if images.len() < 2 {
        return vec![(0, 0); images.len()];
    }

    let pivot = images.len() / 2;
    let reference = build_pyramid(&images[pivot]);

    let mut shifts = vec![(0i64, 0i64); images.len()];
    for (i, img) in images.iter_mut().enumerate() {
        if i == pivot {
            continue;
        }
        let moving = build_pyramid(img);
        let shift = calculate_shift(&reference, &moving);
        if shift != (0, 0) {
            *img = shift_image(img, shift.0, shift.1);
        }
        shifts[i] = shift;
    }
    shifts
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// A scene with enough structure for the bitmaps to lock onto:
    /// non-periodic 8px blocks from a hash, so every pyramid level keeps
    /// unambiguous features.
    fn test_scene(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let h = (x / 8)
                .wrapping_mul(2654435761)
                .wrapping_add((y / 8).wrapping_mul(40503))
                .wrapping_mul(2246822519);
            let v = (h >> 24) as u8;
            Rgb([v, v, v])
        })
    }

    /// Translate with edge clamping and scale intensity by `gain`.
    fn translated(src: &RgbImage, dx: i64, dy: i64, gain: f32) -> RgbImage {
        let (w, h) = (src.width(), src.height());
        RgbImage::from_fn(w, h, |x, y| {
            let sx = (x as i64 - dx).clamp(0, w as i64 - 1) as u32;
            let sy = (y as i64 - dy).clamp(0, h as i64 - 1) as u32;
            let p = src.get_pixel(sx, sy).0;
            Rgb(p.map(|v| (v as f32 * gain).clamp(0.0, 255.0) as u8))
        })
    }

    #[test]
    fn median_of_uniform_image() {
        assert_eq!(median(&[42; 100]), 42);
    }

    #[test]
    fn median_splits_histogram() {
        let gray: Vec<u8> = (0..=255).collect();
        let m = median(&gray);
        assert!((127..=128).contains(&m));
    }

    #[test]
    fn recovers_known_translation() {
        let base = test_scene(128, 128);
        let mut images = vec![translated(&base, 3, -2, 1.0), base.clone()];
        let shifts = align_images(&mut images);

        assert_eq!(shifts[1], (0, 0));
        assert_eq!(shifts[0], (-3, 2));
    }

    #[test]
    fn alignment_survives_exposure_gain() {
        // The point of MTB: a brighter frame must still align.
        let base = test_scene(128, 128);
        let mut images = vec![
            translated(&base, 0, 0, 0.6),
            base.clone(),
            translated(&base, -4, 1, 1.4),
        ];
        let shifts = align_images(&mut images);

        assert_eq!(shifts[0], (0, 0));
        assert_eq!(shifts[1], (0, 0));
        assert_eq!(shifts[2], (4, -1));
    }

    #[test]
    fn aligned_frames_match_reference() {
        let base = test_scene(96, 96);
        let mut images = vec![base.clone(), translated(&base, 2, 3, 1.0)];
        align_images(&mut images);

        // Interior pixels (away from clamped borders) should now agree
        let mut mismatches = 0;
        for y in 8..88 {
            for x in 8..88 {
                if images[0].get_pixel(x, y) != images[1].get_pixel(x, y) {
                    mismatches += 1;
                }
            }
        }
        assert_eq!(mismatches, 0);
    }

    #[test]
    fn single_image_is_untouched() {
        let base = test_scene(64, 64);
        let mut images = vec![base.clone()];
        let shifts = align_images(&mut images);
        assert_eq!(shifts, vec![(0, 0)]);
        assert_eq!(images[0], base);
    }

    #[test]
    fn order_and_count_preserved() {
        let base = test_scene(64, 64);
        let mut images = vec![
            translated(&base, 1, 0, 0.7),
            base.clone(),
            translated(&base, 0, 1, 1.4),
        ];
        align_images(&mut images);
        assert_eq!(images.len(), 3);
    }
}
