//! Exposure metadata extraction.
//!
//! Every input image needs its exposure duration in seconds before merging.
//! That single requirement hides a side-effecting dependency (an external
//! metadata tool), so it sits behind the narrow [`MetadataReader`] trait:
//!
//! - [`ExifToolReader`] — invokes an `exiftool`-style executable as a
//!   subprocess, one image at a time, and greps its `Label : Value` output
//!   for the `Exposure Time` field. This is the primary adapter; exiftool
//!   reads makernotes and RAW sidecars the embedded parser cannot.
//! - [`EmbeddedExifReader`] — parses the EXIF `ExposureTime` rational
//!   directly from the file. No external tooling required; used when no
//!   exiftool path is configured.
//!
//! Tests swap in a table-backed mock so collector logic can be exercised
//! without subprocesses or EXIF fixtures.
//!
//! ## Exposure value format
//!
//! Exiftool renders exposure time as an integer (`"2"`), a decimal
//! (`"0.5"`), or a ratio (`"1/125"`). [`parse_exposure_seconds`] accepts all
//! three and requires the result to be a positive, finite number of seconds.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to run metadata tool {tool}: {source}")]
    ToolLaunch {
        tool: PathBuf,
        source: std::io::Error,
    },
    #[error("No \"Exposure Time\" field in metadata for {0}")]
    MissingExposureTime(PathBuf),
    #[error("Unparsable exposure time {value:?} for {path}")]
    BadExposureValue { value: String, path: PathBuf },
    #[error("Failed to read EXIF from {path}: {reason}")]
    ExifRead { path: PathBuf, reason: String },
}

/// Capability to obtain an image's exposure duration.
///
/// The one seam between the pipeline and the outside world's metadata
/// tooling. Implementations must be side-effect free beyond reading the
/// file / running the tool.
pub trait MetadataReader {
    /// Exposure duration of `path` in seconds. Always positive on success.
    fn exposure_seconds(&self, path: &Path) -> Result<f32, MetadataError>;
}

/// The metadata field the collector consumes, as exiftool labels it.
const EXPOSURE_TIME_LABEL: &str = "Exposure Time";

/// Subprocess adapter: `<exiftool> <image>`, stdout+stderr captured as text.
pub struct ExifToolReader {
    tool: PathBuf,
}

impl ExifToolReader {
    pub fn new(tool: impl AsRef<Path>) -> Self {
        Self {
            tool: tool.as_ref().to_path_buf(),
        }
    }
}

impl MetadataReader for ExifToolReader {
    fn exposure_seconds(&self, path: &Path) -> Result<f32, MetadataError> {
        let output = Command::new(&self.tool)
            .arg(path)
            .output()
            .map_err(|source| MetadataError::ToolLaunch {
                tool: self.tool.clone(),
                source,
            })?;

        // exiftool writes warnings to stderr; fields may land on either
        // stream depending on the wrapper, so both are parsed.
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        let fields = parse_tag_lines(&text);
        let value = fields
            .get(EXPOSURE_TIME_LABEL)
            .ok_or_else(|| MetadataError::MissingExposureTime(path.to_path_buf()))?;

        parse_exposure_seconds(value).ok_or_else(|| MetadataError::BadExposureValue {
            value: value.clone(),
            path: path.to_path_buf(),
        })
    }
}

/// Embedded adapter: reads the EXIF `ExposureTime` rational from the file.
pub struct EmbeddedExifReader;

impl MetadataReader for EmbeddedExifReader {
    fn exposure_seconds(&self, path: &Path) -> Result<f32, MetadataError> {
        let file = std::fs::File::open(path).map_err(|e| MetadataError::ExifRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut reader = std::io::BufReader::new(file);
        let exif = exif::Reader::new()
            .read_from_container(&mut reader)
            .map_err(|e| MetadataError::ExifRead {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let field = exif
            .get_field(exif::Tag::ExposureTime, exif::In::PRIMARY)
            .ok_or_else(|| MetadataError::MissingExposureTime(path.to_path_buf()))?;

        let seconds = match field.value {
            exif::Value::Rational(ref v) if !v.is_empty() => v[0].to_f64() as f32,
            _ => {
                return Err(MetadataError::BadExposureValue {
                    value: format!("{}", field.display_value()),
                    path: path.to_path_buf(),
                });
            }
        };

        if seconds.is_finite() && seconds > 0.0 {
            Ok(seconds)
        } else {
            Err(MetadataError::BadExposureValue {
                value: format!("{seconds}"),
                path: path.to_path_buf(),
            })
        }
    }
}

/// Parse line-oriented `Label : Value` tool output into a field map.
///
/// Per line: the label is everything before the *first* colon, the value is
/// everything after the *last* colon, both trimmed. Known fragility: a value
/// containing a colon (timestamps) is truncated to its final segment. Kept
/// for compatibility with the established tool contract; the one field this
/// pipeline consumes ("Exposure Time") never carries colons in its value.
pub fn parse_tag_lines(text: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for line in text.lines() {
        let Some(first) = line.find(':') else { continue };
        let label = line[..first].trim();
        let value = line.rsplit(':').next().unwrap_or("").trim();
        if !label.is_empty() {
            fields.insert(label.to_string(), value.to_string());
        }
    }
    fields
}

/// Parse an exposure value to seconds.
///
/// `"1/125"` → 0.008, `"0.5"` → 0.5, `"2"` → 2.0. Returns `None` for
/// non-numeric input, non-positive results, or a zero denominator.
pub fn parse_exposure_seconds(value: &str) -> Option<f32> {
    let value = value.trim();
    let seconds = match value.split_once('/') {
        Some((num, den)) => {
            let num: f32 = num.trim().parse().ok()?;
            let den: f32 = den.trim().parse().ok()?;
            num / den
        }
        None => value.parse().ok()?,
    };
    (seconds.is_finite() && seconds > 0.0).then_some(seconds)
}
