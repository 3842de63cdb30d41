//! # hdr-stack
//!
//! Merge a bracketed exposure series into an HDR radiance image, with two
//! tone-mapped renditions for viewing. Your filesystem is the data source:
//! point the tool at a folder of differently-exposed frames of the same
//! scene and it produces `<name>.hdr` plus gamma and Reinhard JPEGs.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! ```text
//! 1. Collect     folder  →  frames + exposure seconds   (ordered, aligned pair)
//! 2. Synthesize  frames  →  radiance                    (align, CRF, merge, .hdr)
//! 3. Tone map    radiance → tm_Gamma_*.jpg, tm_Reinhard_*.jpg
//! ```
//!
//! Stages run strictly in sequence. Each is also exposed as its own
//! subcommand so the intermediate state can be inspected: `collect` prints
//! the frame/exposure pairing (and writes it as JSON), `tonemap` re-renders
//! an existing `.hdr` without touching the bracket.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`collect`] | Stage 1 — enumerate, order, read exposures, decode frames |
//! | [`naming`] | Natural (numeric-aware) filename ordering |
//! | [`metadata`] | `MetadataReader` trait: exiftool subprocess + embedded EXIF adapters |
//! | [`operators`] | The numeric operators: MTB align, CRF calibration, Debevec merge, tone maps |
//! | [`crf`] | Camera response curve type + its text dump codec |
//! | [`radiance`] | Float radiance raster + Radiance `.hdr` I/O + 8-bit quantization |
//! | [`pipeline`] | Stage sequencing, artifact naming, progress events |
//! | [`config`] | `hdr-stack.toml` loading, validation, stock config generation |
//! | [`output`] | CLI output formatting — pure `format_*` functions + `print_*` wrappers |
//!
//! # Design Decisions
//!
//! ## Exposure Metadata Behind a Trait
//!
//! Exposure durations come from image metadata, and the classic way to get
//! at *all* of it (makernotes included) is shelling out to exiftool. That
//! subprocess is quarantined behind the narrow [`metadata::MetadataReader`]
//! trait: configure an `exiftool` path and the subprocess adapter parses
//! its `Label : Value` output; configure none and the embedded-EXIF adapter
//! reads the `ExposureTime` rational directly from the file. Tests use a
//! table-backed mock — no subprocess, no fixtures with real EXIF.
//!
//! ## Pure-Rust Operators (No OpenCV)
//!
//! Alignment, response-curve calibration, merging and tone mapping are
//! implemented in this crate rather than bound from a C++ vision library.
//! The binary stays self-contained and statically linked; the operators are
//! small, documented, and unit-tested against synthetic scenes with known
//! ground truth.
//!
//! ## The CRF Outlives the Run
//!
//! Recovering a camera response curve needs a good bracket; applying one is
//! cheap. So a freshly calibrated curve is dumped as `CRF.txt` next to the
//! input frames — it describes the *camera*, not the run — and later merges
//! of other bracket folders from the same camera can pass `--crf` to skip
//! calibration entirely. The dump format is a plain text array a human can
//! eyeball and plot.
//!
//! ## Fail Fast, Keep What Finished
//!
//! Every error is fatal: a frame without an `Exposure Time`, an undecodable
//! file, a malformed CRF dump, a failed write. Nothing is retried, skipped,
//! or downgraded to a warning. Artifacts already written by completed
//! stages stay on disk — if the Reinhard pass fails, the `.hdr` it would
//! have consumed is still there.

pub mod collect;
pub mod config;
pub mod crf;
pub mod metadata;
pub mod naming;
pub mod operators;
pub mod output;
pub mod pipeline;
pub mod radiance;
