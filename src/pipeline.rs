//! Pipeline orchestration: aligned bracket → HDR + tone-mapped artifacts.
//!
//! Stages run strictly in sequence, each consuming the previous stage's
//! output in memory:
//!
//! ```text
//! 1. Align     MTB shifts, in place
//! 2. CRF       compute + write CRF.txt, or load a supplied dump
//! 3. Merge     weighted log-radiance merge → RadianceImage
//! 4. Persist   <name>.hdr into the result folder
//! 5. Tone map  gamma and Reinhard passes → tm_*.jpg
//! ```
//!
//! The first failure aborts the run; artifacts already written stay on
//! disk (an `.hdr` that exists is valid even if a later tone-map pass
//! failed). Progress is reported through [`PipelineEvent`] values handed to
//! a caller-supplied sink — formatting lives in [`crate::output`], never
//! here.
//!
//! ## Artifact naming
//!
//! With output name `pm`: `pm.hdr`, `tm_Gamma_pm.jpg`, `tm_Reinhard_pm.jpg`.
//! Without: the `hdrDebevec` defaults. `CRF.txt` lands in the *input*
//! directory (it describes the camera, not the run) and only when freshly
//! computed.

use crate::collect::Collection;
use crate::config::TonemapConfig;
use crate::crf::{CrfError, ResponseCurve};
use crate::operators::{align, calibrate, merge, tonemap};
use crate::radiance::{RadianceError, RadianceImage, quantize_to_8bit};
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Base name used when the caller supplies none.
pub const DEFAULT_OUTPUT_NAME: &str = "hdrDebevec";
/// CRF dump filename, written next to the input frames.
pub const CRF_FILE_NAME: &str = "CRF.txt";
/// Result folder name when no override is given.
pub const DEFAULT_RESULT_FOLDER: &str = "Analysis_Results";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Crf(#[from] CrfError),
    #[error(transparent)]
    Radiance(#[from] RadianceError),
    #[error("Cannot create result folder {path}: {source}")]
    ResultFolder {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    WriteImage {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Progress notifications, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Aligning { frames: usize },
    /// Non-zero shift applied to a frame.
    FrameShifted { file: String, dx: i64, dy: i64 },
    CalibratingCrf,
    CrfWritten { path: PathBuf },
    CrfLoaded { path: PathBuf },
    Merging { frames: usize },
    HdrWritten { path: PathBuf },
    TonemapWritten { operator: &'static str, path: PathBuf },
}

/// Everything the run produced, returned for further use or verification.
#[derive(Debug)]
pub struct Artifacts {
    pub hdr: RadianceImage,
    pub gamma_8bit: RgbImage,
    pub reinhard_8bit: RgbImage,
    pub hdr_path: PathBuf,
    pub gamma_path: PathBuf,
    pub reinhard_path: PathBuf,
}

/// Artifact filenames for an optional base name.
pub fn output_names(base: Option<&str>) -> (String, String, String) {
    let base = base.unwrap_or(DEFAULT_OUTPUT_NAME);
    (
        format!("{base}.hdr"),
        format!("tm_Gamma_{base}.jpg"),
        format!("tm_Reinhard_{base}.jpg"),
    )
}

/// Result folder when no override is supplied: inside the input directory.
pub fn default_result_dir(input_dir: &Path) -> PathBuf {
    input_dir.join(DEFAULT_RESULT_FOLDER)
}

/// Stages 1-3: align, acquire CRF, merge.
///
/// `crf_path = None` computes the curve and writes `CRF.txt` into
/// `input_dir`; `Some(path)` loads and validates the dump instead, writing
/// nothing.
pub fn synthesize(
    collection: &mut Collection,
    input_dir: &Path,
    crf_path: Option<&Path>,
    on_event: &mut dyn FnMut(PipelineEvent),
) -> Result<RadianceImage, PipelineError> {
    on_event(PipelineEvent::Aligning {
        frames: collection.images.len(),
    });
    let shifts = align::align_images(&mut collection.images);
    for (path, &(dx, dy)) in collection.paths.iter().zip(shifts.iter()) {
        if (dx, dy) != (0, 0) {
            on_event(PipelineEvent::FrameShifted {
                file: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                dx,
                dy,
            });
        }
    }

    let curve = match crf_path {
        None => {
            on_event(PipelineEvent::CalibratingCrf);
            let curve = calibrate::calibrate(&collection.images, &collection.exposures);
            let dump = input_dir.join(CRF_FILE_NAME);
            curve.save(&dump)?;
            on_event(PipelineEvent::CrfWritten { path: dump });
            curve
        }
        Some(path) => {
            let curve = ResponseCurve::load(path)?;
            on_event(PipelineEvent::CrfLoaded {
                path: path.to_path_buf(),
            });
            curve
        }
    };

    on_event(PipelineEvent::Merging {
        frames: collection.images.len(),
    });
    Ok(merge::merge(
        &collection.images,
        &collection.exposures,
        &curve,
    ))
}

/// Stages 4-5 for an in-memory radiance image: persist `.hdr`, run both
/// tone-map passes, persist both JPEGs.
pub fn persist_and_tonemap(
    hdr: RadianceImage,
    result_dir: &Path,
    output_name: Option<&str>,
    tonemap_config: &TonemapConfig,
    on_event: &mut dyn FnMut(PipelineEvent),
) -> Result<Artifacts, PipelineError> {
    std::fs::create_dir_all(result_dir).map_err(|source| PipelineError::ResultFolder {
        path: result_dir.to_path_buf(),
        source,
    })?;

    let (hdr_name, gamma_name, reinhard_name) = output_names(output_name);
    let hdr_path = result_dir.join(hdr_name);
    hdr.save_hdr(&hdr_path)?;
    on_event(PipelineEvent::HdrWritten {
        path: hdr_path.clone(),
    });

    let (width, height) = (hdr.width(), hdr.height());

    let gamma_mapped = tonemap::gamma(hdr.pixels(), tonemap_config.gamma);
    let gamma_8bit = quantize_to_8bit(width, height, &gamma_mapped);
    let gamma_path = result_dir.join(gamma_name);
    save_jpeg(&gamma_8bit, &gamma_path)?;
    on_event(PipelineEvent::TonemapWritten {
        operator: "Gamma",
        path: gamma_path.clone(),
    });

    let reinhard_mapped = tonemap::reinhard(hdr.pixels(), &tonemap_config.reinhard_params());
    let reinhard_8bit = quantize_to_8bit(width, height, &reinhard_mapped);
    let reinhard_path = result_dir.join(reinhard_name);
    save_jpeg(&reinhard_8bit, &reinhard_path)?;
    on_event(PipelineEvent::TonemapWritten {
        operator: "Reinhard",
        path: reinhard_path.clone(),
    });

    Ok(Artifacts {
        hdr,
        gamma_8bit,
        reinhard_8bit,
        hdr_path,
        gamma_path,
        reinhard_path,
    })
}

/// The full run: synthesize, persist, tone map.
pub fn run(
    collection: &mut Collection,
    input_dir: &Path,
    result_dir: &Path,
    crf_path: Option<&Path>,
    output_name: Option<&str>,
    tonemap_config: &TonemapConfig,
    on_event: &mut dyn FnMut(PipelineEvent),
) -> Result<Artifacts, PipelineError> {
    let hdr = synthesize(collection, input_dir, crf_path, on_event)?;
    persist_and_tonemap(hdr, result_dir, output_name, tonemap_config, on_event)
}

/// Re-tone-map an existing `.hdr` file (the `tonemap` subcommand).
pub fn retonemap(
    hdr_path: &Path,
    result_dir: &Path,
    output_name: Option<&str>,
    tonemap_config: &TonemapConfig,
    on_event: &mut dyn FnMut(PipelineEvent),
) -> Result<Artifacts, PipelineError> {
    let hdr = RadianceImage::load_hdr(hdr_path)?;
    // The fresh .hdr copy under the result folder makes the output set
    // self-contained, same as a full run.
    persist_and_tonemap(hdr, result_dir, output_name, tonemap_config, on_event)
}

fn save_jpeg(img: &RgbImage, path: &Path) -> Result<(), PipelineError> {
    img.save(path).map_err(|source| PipelineError::WriteImage {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::Collection;
    use image::Rgb;
    use tempfile::TempDir;

    /// Three-frame bracket of a gradient scene with structure for MTB and
    /// consistent exposure ratios for the merge.
    fn test_collection() -> Collection {
        let (w, h) = (64, 48);
        let times = [1.0f32 / 8.0, 1.0 / 2.0, 2.0];
        let images = times
            .iter()
            .map(|&t| {
                image::RgbImage::from_fn(w, h, |x, y| {
                    let e = 0.02 + (x as f32 / w as f32) * 0.8 + (y as f32 / h as f32) * 0.2;
                    let z = (255.0 * (e * t).powf(1.0 / 2.2)).clamp(0.0, 255.0) as u8;
                    Rgb([z, z, z])
                })
            })
            .collect();
        Collection {
            paths: vec![
                PathBuf::from("b1.jpg"),
                PathBuf::from("b2.jpg"),
                PathBuf::from("b3.jpg"),
            ],
            images,
            exposures: times.to_vec(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn output_names_with_base() {
        let (hdr, gamma, reinhard) = output_names(Some("pm"));
        assert_eq!(hdr, "pm.hdr");
        assert_eq!(gamma, "tm_Gamma_pm.jpg");
        assert_eq!(reinhard, "tm_Reinhard_pm.jpg");
    }

    #[test]
    fn output_names_default() {
        let (hdr, gamma, reinhard) = output_names(None);
        assert_eq!(hdr, "hdrDebevec.hdr");
        assert_eq!(gamma, "tm_Gamma_hdrDebevec.jpg");
        assert_eq!(reinhard, "tm_Reinhard_hdrDebevec.jpg");
    }

    #[test]
    fn default_result_dir_is_inside_input() {
        assert_eq!(
            default_result_dir(Path::new("/shoot/brackets")),
            Path::new("/shoot/brackets/Analysis_Results")
        );
    }

    #[test]
    fn full_run_produces_all_artifacts() {
        let tmp = TempDir::new().unwrap();
        let input_dir = tmp.path().join("input");
        let result_dir = tmp.path().join("results");
        std::fs::create_dir_all(&input_dir).unwrap();

        let mut collection = test_collection();
        let mut events = Vec::new();
        let artifacts = run(
            &mut collection,
            &input_dir,
            &result_dir,
            None,
            Some("pm"),
            &TonemapConfig::default(),
            &mut |e| events.push(e),
        )
        .unwrap();

        assert!(result_dir.join("pm.hdr").exists());
        assert!(result_dir.join("tm_Gamma_pm.jpg").exists());
        assert!(result_dir.join("tm_Reinhard_pm.jpg").exists());
        assert!(input_dir.join("CRF.txt").exists());

        assert_eq!(artifacts.hdr.width(), 64);
        assert_eq!(artifacts.gamma_8bit.dimensions(), (64, 48));
        assert_eq!(artifacts.reinhard_8bit.dimensions(), (64, 48));

        assert!(events.contains(&PipelineEvent::CalibratingCrf));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, PipelineEvent::HdrWritten { .. }))
        );
    }

    #[test]
    fn supplied_crf_skips_computation_and_dump() {
        let tmp = TempDir::new().unwrap();
        let input_dir = tmp.path().join("input");
        let result_dir = tmp.path().join("results");
        std::fs::create_dir_all(&input_dir).unwrap();

        let crf_file = tmp.path().join("camera-crf.txt");
        ResponseCurve::linear().save(&crf_file).unwrap();

        let mut collection = test_collection();
        let mut events = Vec::new();
        run(
            &mut collection,
            &input_dir,
            &result_dir,
            Some(&crf_file),
            None,
            &TonemapConfig::default(),
            &mut |e| events.push(e),
        )
        .unwrap();

        assert!(!input_dir.join("CRF.txt").exists());
        assert!(!events.contains(&PipelineEvent::CalibratingCrf));
        assert!(events.contains(&PipelineEvent::CrfLoaded {
            path: crf_file.clone()
        }));
        assert!(result_dir.join("hdrDebevec.hdr").exists());
    }

    #[test]
    fn invalid_supplied_crf_is_fatal_before_any_output() {
        let tmp = TempDir::new().unwrap();
        let input_dir = tmp.path().join("input");
        let result_dir = tmp.path().join("results");
        std::fs::create_dir_all(&input_dir).unwrap();

        let crf_file = tmp.path().join("bad-crf.txt");
        std::fs::write(&crf_file, "1.0 2.0 3.0\n").unwrap();

        let mut collection = test_collection();
        let err = run(
            &mut collection,
            &input_dir,
            &result_dir,
            Some(&crf_file),
            None,
            &TonemapConfig::default(),
            &mut |_| {},
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::Crf(CrfError::WrongCount { .. })));
        assert!(!result_dir.exists());
    }

    #[test]
    fn written_crf_round_trips_into_a_second_run() {
        let tmp = TempDir::new().unwrap();
        let input_dir = tmp.path().join("input");
        std::fs::create_dir_all(&input_dir).unwrap();

        let mut first = test_collection();
        let hdr_a = synthesize(&mut first, &input_dir, None, &mut |_| {}).unwrap();

        let dump = input_dir.join("CRF.txt");
        let mut second = test_collection();
        let hdr_b = synthesize(&mut second, &input_dir, Some(&dump), &mut |_| {}).unwrap();

        // Same bracket + same curve (through the text codec) = same merge,
        // within the dump's 7-decimal precision.
        for (a, b) in hdr_a.pixels().iter().zip(hdr_b.pixels()) {
            for c in 0..3 {
                assert!((a[c] - b[c]).abs() < 1e-3 * a[c].abs().max(1.0));
            }
        }
    }

    #[test]
    fn retonemap_reads_back_a_saved_hdr() {
        let tmp = TempDir::new().unwrap();
        let input_dir = tmp.path().join("input");
        let result_dir = tmp.path().join("results");
        let second_dir = tmp.path().join("retoned");
        std::fs::create_dir_all(&input_dir).unwrap();

        let mut collection = test_collection();
        let artifacts = run(
            &mut collection,
            &input_dir,
            &result_dir,
            None,
            Some("pm"),
            &TonemapConfig::default(),
            &mut |_| {},
        )
        .unwrap();

        let redone = retonemap(
            &artifacts.hdr_path,
            &second_dir,
            Some("pm2"),
            &TonemapConfig::default(),
            &mut |_| {},
        )
        .unwrap();

        assert!(second_dir.join("pm2.hdr").exists());
        assert!(second_dir.join("tm_Gamma_pm2.jpg").exists());
        assert!(second_dir.join("tm_Reinhard_pm2.jpg").exists());
        assert_eq!(redone.hdr.width(), 64);
    }
}
