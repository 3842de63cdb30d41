//! Camera response function: type and on-disk text codec.
//!
//! A [`ResponseCurve`] maps each of the 256 discrete pixel intensities to a
//! relative log-irradiance per color channel — the `(256, 1, 3)` array shape
//! of the established tooling. It is either recovered from the bracket by
//! [`crate::operators::calibrate`] or loaded from a previous run's dump, so
//! a calibration computed once per camera can be reused across merges.
//!
//! ## Text format
//!
//! The dump is an explicit encode/decode pair (round-trip tested) over the
//! legacy layout:
//!
//! ```text
//! # Array shape: (256, 1, 3)
//!  0.0012345  0.0012001  0.0011877
//! # New slice
//!  0.0024690  0.0024002  0.0023754
//! # New slice
//! ...
//! ```
//!
//! One fixed-width row (`%10.7f`, space-separated) per intensity level,
//! each followed by a `# New slice` separator. The loader skips every `#`
//! line and parses the remaining whitespace-delimited floats in row-major
//! order; anything other than exactly 256 × 1 × 3 numeric values is fatal.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Number of discrete intensity levels.
pub const LEVELS: usize = 256;
/// Color channels per level.
pub const CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum CrfError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CRF file {path} has {found} values, expected {expected} (256 x 1 x 3)")]
    WrongCount {
        path: PathBuf,
        found: usize,
        expected: usize,
    },
    #[error("CRF file {path} contains non-numeric token {token:?}")]
    BadToken { path: PathBuf, token: String },
}

/// Per-channel log-irradiance response, one row per intensity level.
///
/// Anchored so the mid-gray level (index 128) maps to 0.0 on every channel;
/// all other values are relative to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseCurve {
    rows: Box<[[f32; CHANNELS]; LEVELS]>,
}

impl ResponseCurve {
    pub fn from_rows(rows: Box<[[f32; CHANNELS]; LEVELS]>) -> Self {
        Self { rows }
    }

    /// Log-irradiance for intensity `level` on `channel`.
    #[inline]
    pub fn log_irradiance(&self, level: u8, channel: usize) -> f32 {
        self.rows[level as usize][channel]
    }

    pub fn rows(&self) -> &[[f32; CHANNELS]; LEVELS] {
        &self.rows
    }

    /// The response of an ideal linear sensor: `g(z) = ln((z+1)/129)`,
    /// so g(128) = 0. Calibration's starting point, and a serviceable
    /// stand-in when calibrating from a single image is impossible.
    pub fn linear() -> Self {
        let mut rows = Box::new([[0.0f32; CHANNELS]; LEVELS]);
        for (z, row) in rows.iter_mut().enumerate() {
            let g = ((z as f32 + 1.0) / 129.0).ln();
            *row = [g; CHANNELS];
        }
        Self { rows }
    }

    /// Serialize to the legacy fixed-width text layout.
    pub fn to_text(&self) -> String {
        // 256 rows x (3 fields + separator line) at ~11 bytes per field
        let mut out = String::with_capacity(LEVELS * 48);
        out.push_str("# Array shape: (256, 1, 3)\n");
        for row in self.rows.iter() {
            let _ = writeln!(out, "{:10.7} {:10.7} {:10.7}", row[0], row[1], row[2]);
            out.push_str("# New slice\n");
        }
        out
    }

    /// Parse the text layout back into a curve.
    ///
    /// `origin` only labels errors; no I/O happens here.
    pub fn from_text(text: &str, origin: &Path) -> Result<Self, CrfError> {
        let mut values = Vec::with_capacity(LEVELS * CHANNELS);
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            for token in line.split_whitespace() {
                let v: f32 = token.parse().map_err(|_| CrfError::BadToken {
                    path: origin.to_path_buf(),
                    token: token.to_string(),
                })?;
                values.push(v);
            }
        }

        if values.len() != LEVELS * CHANNELS {
            return Err(CrfError::WrongCount {
                path: origin.to_path_buf(),
                found: values.len(),
                expected: LEVELS * CHANNELS,
            });
        }

        let mut rows = Box::new([[0.0f32; CHANNELS]; LEVELS]);
        for (z, row) in rows.iter_mut().enumerate() {
            row.copy_from_slice(&values[z * CHANNELS..(z + 1) * CHANNELS]);
        }
        Ok(Self { rows })
    }

    /// Write the curve to `path` in text form.
    pub fn save(&self, path: &Path) -> Result<(), CrfError> {
        std::fs::write(path, self.to_text()).map_err(|source| CrfError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a curve from a text dump at `path`.
    pub fn load(path: &Path) -> Result<Self, CrfError> {
        let text = std::fs::read_to_string(path).map_err(|source| CrfError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_text(&text, path)
    }
}
