//! Input collection: directory of LDR frames → aligned (images, exposures).
//!
//! Stage 1 of the merge pipeline. Enumerates files by extension, orders
//! them naturally (see [`crate::naming`]), obtains each frame's exposure
//! duration through a [`MetadataReader`], and decodes every frame. The
//! returned [`Collection`] guarantees the invariants the synthesizer
//! depends on:
//!
//! - at least one frame, every frame decoded;
//! - image sequence and exposure sequence have equal length and matching
//!   index correspondence, in natural filename order;
//! - every exposure is a positive number of seconds;
//! - all frames share one set of pixel dimensions.
//!
//! Any violation is fatal for the whole run — there is no per-frame skip.
//! Run standalone (`hdr-stack collect`), the stage also serializes an
//! [`ExposureManifest`] so the pairing can be inspected before committing
//! to a merge.

use crate::metadata::{MetadataError, MetadataReader};
use crate::naming::natural_cmp;
use image::RgbImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Cannot read input directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No files matching *{ext} in {path}")]
    NoImages { path: PathBuf, ext: String },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("{path} is {found_w}x{found_h}, expected {want_w}x{want_h} like the first frame")]
    DimensionMismatch {
        path: PathBuf,
        found_w: u32,
        found_h: u32,
        want_w: u32,
        want_h: u32,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The aligned pair the synthesizer consumes, plus provenance.
#[derive(Debug)]
pub struct Collection {
    /// Source files, natural order. Index-aligned with `images`/`exposures`.
    pub paths: Vec<PathBuf>,
    /// Decoded frames, 8-bit RGB.
    pub images: Vec<RgbImage>,
    /// Exposure durations in seconds, one per frame.
    pub exposures: Vec<f32>,
    /// Informational notes (duplicate exposures etc.) for the progress
    /// channel. Never a substitute for an error.
    pub warnings: Vec<String>,
}

/// Serializable view of the collected pairing, one row per frame.
#[derive(Debug, Serialize)]
pub struct ExposureManifest {
    pub frames: Vec<ExposureEntry>,
}

#[derive(Debug, Serialize)]
pub struct ExposureEntry {
    pub file: String,
    pub exposure_seconds: f32,
}

impl Collection {
    pub fn manifest(&self) -> ExposureManifest {
        ExposureManifest {
            frames: self
                .paths
                .iter()
                .zip(self.exposures.iter())
                .map(|(path, &secs)| ExposureEntry {
                    file: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    exposure_seconds: secs,
                })
                .collect(),
        }
    }

    /// Write the manifest as pretty JSON.
    pub fn write_manifest(&self, path: &Path) -> Result<(), CollectError> {
        let json = serde_json::to_string_pretty(&self.manifest())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Enumerate `*{ext}` files in `dir`, natural-sorted ascending.
pub fn list_frames(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, CollectError> {
    let entries = std::fs::read_dir(dir).map_err(|source| CollectError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .map(|n| {
                        let name = n.to_string_lossy();
                        name.ends_with(ext) && !name.starts_with('.')
                    })
                    .unwrap_or(false)
        })
        .collect();

    paths.sort_by(|a, b| {
        natural_cmp(
            &a.file_name().unwrap_or_default().to_string_lossy(),
            &b.file_name().unwrap_or_default().to_string_lossy(),
        )
    });

    if paths.is_empty() {
        return Err(CollectError::NoImages {
            path: dir.to_path_buf(),
            ext: ext.to_string(),
        });
    }
    Ok(paths)
}

/// Collect the full aligned pair from a directory.
///
/// Exposure lookup runs first (one subprocess at a time, in order) so a
/// metadata failure aborts before any decode work happens.
pub fn collect(
    dir: &Path,
    ext: &str,
    reader: &dyn MetadataReader,
) -> Result<Collection, CollectError> {
    let paths = list_frames(dir, ext)?;

    let mut exposures = Vec::with_capacity(paths.len());
    for path in &paths {
        exposures.push(reader.exposure_seconds(path)?);
    }

    let warnings = duplicate_exposure_warnings(&paths, &exposures);

    let mut images: Vec<RgbImage> = Vec::with_capacity(paths.len());
    for path in &paths {
        let img = image::open(path)
            .map_err(|source| CollectError::Decode {
                path: path.clone(),
                source,
            })?
            .to_rgb8();
        if let Some(first) = images.first()
            && (img.width(), img.height()) != (first.width(), first.height())
        {
            return Err(CollectError::DimensionMismatch {
                path: path.clone(),
                found_w: img.width(),
                found_h: img.height(),
                want_w: first.width(),
                want_h: first.height(),
            });
        }
        images.push(img);
    }

    Ok(Collection {
        paths,
        images,
        exposures,
        warnings,
    })
}

/// Near-duplicate exposures add no dynamic range; the merge still runs
/// (burst stacking is legitimate) but the pairing deserves a note.
fn duplicate_exposure_warnings(paths: &[PathBuf], exposures: &[f32]) -> Vec<String> {
    let mut warnings = Vec::new();
    for i in 0..exposures.len() {
        for j in i + 1..exposures.len() {
            let (a, b) = (exposures[i], exposures[j]);
            if (a - b).abs() <= a.max(b) * 1e-3 {
                warnings.push(format!(
                    "near-duplicate exposure {}s: {} and {}",
                    a,
                    paths[i].file_name().unwrap_or_default().to_string_lossy(),
                    paths[j].file_name().unwrap_or_default().to_string_lossy(),
                ));
            }
        }
    }
    warnings
}
