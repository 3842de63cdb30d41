//! Camera response calibration from a bracketed exposure series.
//!
//! Recovers, per channel, the Debevec log-irradiance curve `g` satisfying
//! `g(z) = ln E + ln t` for every observation of pixel irradiance `E` at
//! exposure `t` recording intensity `z`. Rather than solving the full
//! least-squares system directly, the estimate is refined iteratively —
//! alternate between the two unknowns until they agree:
//!
//! 1. fix `g`, estimate each sample pixel's `ln E` as its weighted mean of
//!    `g(z) − ln t` across the bracket;
//! 2. fix the `ln E`s, re-estimate `g(z)` as the weighted mean of
//!    `ln E + ln t` over all observations landing on level `z`.
//!
//! Each round ends with a light smoothing pass (the counterpart of the
//! closed-form solution's second-derivative penalty) and re-anchoring to
//! `g(128) = 0`. Observations are taken from a subsampled pixel grid; the
//! triangle weight discounts near-clipped levels.

use crate::crf::{CHANNELS, LEVELS, ResponseCurve};
use crate::operators::hat_weight;
use image::RgbImage;
use rayon::prelude::*;

/// Target number of sample pixels per channel.
const SAMPLE_TARGET: usize = 2048;
/// Refinement rounds. Convergence is geometric; this is well past the
/// point where changes drop below the text dump's 1e-7 resolution.
const ROUNDS: usize = 30;

/// Recover the response curve from aligned images and exposure seconds.
///
/// Caller guarantees a non-empty set, equal lengths, equal dimensions and
/// positive times (the collector's postconditions).
pub fn calibrate(images: &[RgbImage], times: &[f32]) -> ResponseCurve {
    debug_assert_eq!(images.len(), times.len());
    debug_assert!(!images.is_empty());

    let log_times: Vec<f32> = times.iter().map(|t| t.ln()).collect();
    let samples = sample_grid(images[0].width(), images[0].height());

    // samples x images intensity observations, gathered once per channel
    let rows: Vec<[Vec<u8>; CHANNELS]> = samples
        .par_iter()
        .map(|&(x, y)| {
            let mut obs: [Vec<u8>; CHANNELS] = std::array::from_fn(|_| Vec::new());
            for img in images {
                let p = img.get_pixel(x, y).0;
                for (c, channel_obs) in obs.iter_mut().enumerate() {
                    channel_obs.push(p[c]);
                }
            }
            obs
        })
        .collect();

    let mut curve = Box::new([[0.0f32; CHANNELS]; LEVELS]);
    let per_channel: Vec<[f32; LEVELS]> = (0..CHANNELS)
        .into_par_iter()
        .map(|c| {
            let observations: Vec<&Vec<u8>> = rows.iter().map(|r| &r[c]).collect();
            refine_channel(&observations, &log_times)
        })
        .collect();
    for (z, row) in curve.iter_mut().enumerate() {
        for (c, channel) in per_channel.iter().enumerate() {
            row[c] = channel[z];
        }
    }
    ResponseCurve::from_rows(curve)
}

/// Evenly spaced grid of roughly [`SAMPLE_TARGET`] coordinates.
fn sample_grid(width: u32, height: u32) -> Vec<(u32, u32)> {
    let total = (width as usize) * (height as usize);
    let step = ((total as f64 / SAMPLE_TARGET as f64).sqrt() as u32).max(1);
    let mut coords = Vec::new();
    let mut y = step / 2;
    while y < height {
        let mut x = step / 2;
        while x < width {
            coords.push((x, y));
            x += step;
        }
        y += step;
    }
    coords
}

/// Iterative g / lnE refinement for one channel.
fn refine_channel(observations: &[&Vec<u8>], log_times: &[f32]) -> [f32; LEVELS] {
    let linear = ResponseCurve::linear();
    let mut g: [f32; LEVELS] = std::array::from_fn(|z| linear.rows()[z][0]);

    for _ in 0..ROUNDS {
        // Step 1: per-sample log irradiance under the current curve.
        let log_irradiance: Vec<Option<f32>> = observations
            .iter()
            .map(|zs| {
                let mut acc = 0.0f32;
                let mut wsum = 0.0f32;
                for (j, &z) in zs.iter().enumerate() {
                    let w = hat_weight(z);
                    acc += w * (g[z as usize] - log_times[j]);
                    wsum += w;
                }
                (wsum > 0.0).then(|| acc / wsum)
            })
            .collect();

        // Step 2: re-estimate each level from the observations landing on it.
        let mut acc = [0.0f32; LEVELS];
        let mut wsum = [0.0f32; LEVELS];
        for (zs, ln_e) in observations.iter().zip(log_irradiance.iter()) {
            let Some(ln_e) = ln_e else { continue };
            for (j, &z) in zs.iter().enumerate() {
                let w = hat_weight(z);
                acc[z as usize] += w * (ln_e + log_times[j]);
                wsum[z as usize] += w;
            }
        }
        let mut next = [0.0f32; LEVELS];
        for z in 0..LEVELS {
            next[z] = if wsum[z] > 0.0 { acc[z] / wsum[z] } else { g[z] };
        }

        fill_unobserved(&mut next, &wsum);
        smooth(&mut next);
        let anchor = next[128];
        for v in &mut next {
            *v -= anchor;
        }
        g = next;
    }
    g
}

/// Linear interpolation across levels no observation reached, so the curve
/// stays defined (and monotone-ish) over its full domain.
fn fill_unobserved(g: &mut [f32; LEVELS], wsum: &[f32; LEVELS]) {
    let observed: Vec<usize> = (0..LEVELS).filter(|&z| wsum[z] > 0.0).collect();
    if observed.is_empty() {
        return;
    }
    for z in 0..LEVELS {
        if wsum[z] > 0.0 {
            continue;
        }
        let prev = observed.iter().rev().find(|&&o| o < z);
        let next = observed.iter().find(|&&o| o > z);
        g[z] = match (prev, next) {
            (Some(&a), Some(&b)) => {
                let t = (z - a) as f32 / (b - a) as f32;
                g[a] + (g[b] - g[a]) * t
            }
            (Some(&a), None) => g[a],
            (None, Some(&b)) => g[b],
            (None, None) => g[z],
        };
    }
}

/// One 1-2-1 kernel pass, endpoints pinned.
fn smooth(g: &mut [f32; LEVELS]) {
    let prev = *g;
    for z in 1..LEVELS - 1 {
        g[z] = 0.25 * prev[z - 1] + 0.5 * prev[z] + 0.25 * prev[z + 1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Render a bracket of a fixed synthetic scene through a known response:
    /// `z = 255 * (E * t)^(1/gamma)`, clamped.
    fn synthetic_bracket(gamma: f32, times: &[f32]) -> Vec<RgbImage> {
        let (w, h) = (96, 96);
        times
            .iter()
            .map(|&t| {
                RgbImage::from_fn(w, h, |x, y| {
                    // Scene radiance spans ~3 decades across the frame
                    let e = 0.01 * 1000.0f32.powf((x + y * w) as f32 / ((w * h - 1) as f32));
                    let z = (255.0 * (e * t).powf(1.0 / gamma)).clamp(0.0, 255.0) as u8;
                    Rgb([z, z, z])
                })
            })
            .collect()
    }

    #[test]
    fn recovered_curve_is_monotone_over_observed_range() {
        let times = [1.0 / 60.0, 1.0 / 15.0, 0.25, 1.0];
        let images = synthetic_bracket(2.2, &times);
        let curve = calibrate(&images, &times);

        for c in 0..CHANNELS {
            for z in 20..230u8 {
                assert!(
                    curve.log_irradiance(z + 1, c) >= curve.log_irradiance(z, c) - 0.02,
                    "channel {c} not monotone at level {z}"
                );
            }
        }
    }

    #[test]
    fn recovered_curve_matches_known_gamma() {
        let gamma = 2.0;
        let times = [1.0 / 60.0, 1.0 / 15.0, 0.25, 1.0];
        let images = synthetic_bracket(gamma, &times);
        let curve = calibrate(&images, &times);

        // For z = 255 * (E t)^(1/gamma): g(z) - g(128) = gamma * ln(z / 128)
        for &z in &[64u8, 96, 160, 192] {
            let expected = gamma * (z as f32 / 128.0).ln();
            let got = curve.log_irradiance(z, 1);
            assert!(
                (got - expected).abs() < 0.25,
                "level {z}: expected {expected:.3}, got {got:.3}"
            );
        }
    }

    #[test]
    fn curve_is_anchored_at_mid_gray() {
        let times = [0.01, 0.1, 1.0];
        let images = synthetic_bracket(2.2, &times);
        let curve = calibrate(&images, &times);
        for c in 0..CHANNELS {
            assert!(curve.log_irradiance(128, c).abs() < 1e-5);
        }
    }

    #[test]
    fn sample_grid_is_dense_enough() {
        let coords = sample_grid(1000, 1000);
        assert!(coords.len() >= SAMPLE_TARGET / 2);
        assert!(coords.iter().all(|&(x, y)| x < 1000 && y < 1000));
    }

    #[test]
    fn sample_grid_covers_small_images() {
        let coords = sample_grid(8, 8);
        assert_eq!(coords.len(), 64);
    }

    #[test]
    fn fill_unobserved_interpolates_gaps() {
        let mut g = [0.0f32; LEVELS];
        let mut wsum = [0.0f32; LEVELS];
        g[100] = 1.0;
        wsum[100] = 1.0;
        g[104] = 3.0;
        wsum[104] = 1.0;
        fill_unobserved(&mut g, &wsum);
        assert!((g[102] - 2.0).abs() < 1e-6);
        // Ends clamp to the nearest observation
        assert!((g[0] - 1.0).abs() < 1e-6);
        assert!((g[255] - 3.0).abs() < 1e-6);
    }
}
