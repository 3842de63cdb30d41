//! Debevec-style weighted merge of the bracket into linear radiance.
//!
//! Per pixel and channel, every frame contributes an irradiance estimate
//! `g(z) − ln t`; estimates are blended in log space with the triangle
//! weight so near-clipped observations count for little:
//!
//! ```text
//! ln E = Σ_j w(z_j) · (g(z_j) − ln t_j) / Σ_j w(z_j)
//! ```
//!
//! A pixel clipped in *every* frame has zero total weight; it falls back to
//! the mid-exposure frame's estimate rather than dividing by zero, which
//! keeps blown highlights finite instead of NaN.

use crate::crf::ResponseCurve;
use crate::operators::hat_weight;
use crate::radiance::RadianceImage;
use image::RgbImage;
use rayon::prelude::*;

/// Merge aligned frames into one radiance raster.
///
/// Caller guarantees a non-empty set, equal lengths, equal dimensions and
/// positive times (the collector's postconditions).
pub fn merge(images: &[RgbImage], times: &[f32], curve: &ResponseCurve) -> RadianceImage {
    debug_assert_eq!(images.len(), times.len());
    debug_assert!(!images.is_empty());

    let (width, height) = (images[0].width(), images[0].height());
    let log_times: Vec<f32> = times.iter().map(|t| t.ln()).collect();
    let rasters: Vec<&[u8]> = images.iter().map(|img| img.as_raw().as_slice()).collect();
    let mid = images.len() / 2;

    let pixels: Vec<[f32; 3]> = (0..(width as usize) * (height as usize))
        .into_par_iter()
        .map(|i| {
            let mut out = [0.0f32; 3];
            for (c, v) in out.iter_mut().enumerate() {
                let mut acc = 0.0f32;
                let mut wsum = 0.0f32;
                for (j, raster) in rasters.iter().enumerate() {
                    let z = raster[i * 3 + c];
                    let w = hat_weight(z);
                    acc += w * (curve.log_irradiance(z, c) - log_times[j]);
                    wsum += w;
                }
                let ln_e = if wsum > 0.0 {
                    acc / wsum
                } else {
                    // Clipped everywhere: trust the middle exposure.
                    let z = rasters[mid][i * 3 + c];
                    curve.log_irradiance(z, c) - log_times[mid]
                };
                *v = ln_e.exp();
            }
            out
        })
        .collect();

    RadianceImage::from_pixels(width, height, pixels)
}
