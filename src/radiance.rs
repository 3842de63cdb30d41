//! Linear radiance raster and Radiance `.hdr` I/O.
//!
//! [`RadianceImage`] is the merge output: one `[r, g, b]` of `f32` linear
//! light per pixel, unbounded range, row-major. It is written losslessly in
//! the Radiance RGBE format via the `image` crate's HDR codec and read back
//! the same way for standalone re-tone-mapping.

use image::codecs::hdr::HdrEncoder;
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RadianceError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("HDR codec error on {path}: {source}")]
    Codec {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// A floating-point raster of linear scene radiance.
#[derive(Debug, Clone, PartialEq)]
pub struct RadianceImage {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 3]>,
}

impl RadianceImage {
    /// All-zero raster of the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 3]; (width * height) as usize],
        }
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<[f32; 3]>) -> Self {
        assert_eq!(pixels.len(), (width * height) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[[f32; 3]] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [[f32; 3]] {
        &mut self.pixels
    }

    /// Write as Radiance RGBE (`.hdr`).
    pub fn save_hdr(&self, path: &Path) -> Result<(), RadianceError> {
        let file = std::fs::File::create(path).map_err(|source| RadianceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let writer = std::io::BufWriter::new(file);
        let data: Vec<Rgb<f32>> = self.pixels.iter().map(|p| Rgb(*p)).collect();
        HdrEncoder::new(writer)
            .encode(&data, self.width as usize, self.height as usize)
            .map_err(|source| RadianceError::Codec {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Read a Radiance `.hdr` file back into a float raster.
    pub fn load_hdr(path: &Path) -> Result<Self, RadianceError> {
        let dynamic = image::ImageReader::open(path)
            .map_err(|source| RadianceError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .decode()
            .map_err(|source| RadianceError::Codec {
                path: path.to_path_buf(),
                source,
            })?;
        let float = dynamic.to_rgb32f();
        let (width, height) = (float.width(), float.height());
        let pixels = float.pixels().map(|p| p.0).collect();
        Ok(Self {
            width,
            height,
            pixels,
        })
    }
}

/// Quantize a [0, 1]-ish float raster to 8-bit: scale by 255, clamp to
/// [0, 255], truncate. Out-of-range intermediates never escape the clamp.
pub fn quantize_to_8bit(width: u32, height: u32, pixels: &[[f32; 3]]) -> RgbImage {
    debug_assert_eq!(pixels.len(), (width * height) as usize);
    let mut out = RgbImage::new(width, height);
    for (dst, src) in out.pixels_mut().zip(pixels.iter()) {
        *dst = Rgb([
            (src[0] * 255.0).clamp(0.0, 255.0) as u8,
            (src[1] * 255.0).clamp(0.0, 255.0) as u8,
            (src[2] * 255.0).clamp(0.0, 255.0) as u8,
        ]);
    }
    out
}
