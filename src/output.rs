//! CLI output formatting for all pipeline stages.
//!
//! Progress output is informational only — it is not an error channel, and
//! nothing downstream parses it. Each stage has a `format_*` function
//! (returns `Vec<String>`, pure, unit-testable) and a `print_*` wrapper
//! that writes to stdout.
//!
//! ## Collect
//!
//! ```text
//! Frames (3)
//! 001 img1.jpg  1/125s (0.00800s)
//! 002 img2.jpg  1/30s (0.03333s)
//! 003 img10.jpg  1/8s (0.12500s)
//! Warning: near-duplicate exposure 0.25s: a.jpg and b.jpg
//! ```
//!
//! ## Merge
//!
//! ```text
//! Aligning 3 frames
//!     img2.jpg shifted by (+1, -2)
//! Calibrating camera response
//!     CRF written: /shoot/CRF.txt
//! Merging 3 frames
//! HDR written: /shoot/Analysis_Results/pm.hdr
//! Tonemap Gamma: /shoot/Analysis_Results/tm_Gamma_pm.jpg
//! Tonemap Reinhard: /shoot/Analysis_Results/tm_Reinhard_pm.jpg
//! ```

use crate::collect::Collection;
use crate::pipeline::PipelineEvent;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Render seconds the way photographers read shutter speeds: as a ratio
/// below one second, decimal otherwise.
fn format_exposure(seconds: f32) -> String {
    if seconds < 1.0 && seconds > 0.0 {
        let denominator = 1.0 / seconds;
        // Only print a clean ratio when the denominator is close to whole
        if (denominator - denominator.round()).abs() < 0.05 {
            return format!("1/{:.0}s ({seconds:.5}s)", denominator.round());
        }
    }
    format!("{seconds:.5}s")
}

/// One line per frame, index + filename + exposure.
pub fn format_collect_output(collection: &Collection) -> Vec<String> {
    let mut lines = vec![format!("Frames ({})", collection.paths.len())];
    for (i, (path, &secs)) in collection
        .paths
        .iter()
        .zip(collection.exposures.iter())
        .enumerate()
    {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        lines.push(format!(
            "{} {}  {}",
            format_index(i + 1),
            name,
            format_exposure(secs)
        ));
    }
    for warning in &collection.warnings {
        lines.push(format!("Warning: {warning}"));
    }
    lines
}

pub fn print_collect_output(collection: &Collection) {
    for line in format_collect_output(collection) {
        println!("{line}");
    }
}

/// Render a single pipeline progress event.
pub fn format_pipeline_event(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::Aligning { frames } => format!("Aligning {frames} frames"),
        PipelineEvent::FrameShifted { file, dx, dy } => {
            format!("    {file} shifted by ({dx:+}, {dy:+})")
        }
        PipelineEvent::CalibratingCrf => "Calibrating camera response".to_string(),
        PipelineEvent::CrfWritten { path } => format!("    CRF written: {}", path.display()),
        PipelineEvent::CrfLoaded { path } => format!("    CRF loaded: {}", path.display()),
        PipelineEvent::Merging { frames } => format!("Merging {frames} frames"),
        PipelineEvent::HdrWritten { path } => format!("HDR written: {}", path.display()),
        PipelineEvent::TonemapWritten { operator, path } => {
            format!("Tonemap {operator}: {}", path.display())
        }
    }
}

pub fn print_pipeline_event(event: &PipelineEvent) {
    println!("{}", format_pipeline_event(event));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_collection() -> Collection {
        Collection {
            paths: vec![PathBuf::from("/in/img1.jpg"), PathBuf::from("/in/img10.jpg")],
            images: Vec::new(),
            exposures: vec![1.0 / 125.0, 2.0],
            warnings: vec!["near-duplicate exposure".to_string()],
        }
    }

    #[test]
    fn collect_output_lists_frames_in_order() {
        let lines = format_collect_output(&sample_collection());
        assert_eq!(lines[0], "Frames (2)");
        assert!(lines[1].starts_with("001 img1.jpg"));
        assert!(lines[2].starts_with("002 img10.jpg"));
    }

    #[test]
    fn collect_output_carries_warnings_last() {
        let lines = format_collect_output(&sample_collection());
        assert_eq!(lines.last().unwrap(), "Warning: near-duplicate exposure");
    }

    #[test]
    fn sub_second_exposures_render_as_ratio() {
        assert_eq!(format_exposure(1.0 / 125.0), "1/125s (0.00800s)");
        assert_eq!(format_exposure(0.25), "1/4s (0.25000s)");
    }

    #[test]
    fn long_exposures_render_as_decimal() {
        assert_eq!(format_exposure(2.0), "2.00000s");
        assert_eq!(format_exposure(1.0), "1.00000s");
    }

    #[test]
    fn awkward_fractions_fall_back_to_decimal() {
        assert_eq!(format_exposure(0.37), "0.37000s");
    }

    #[test]
    fn shift_event_shows_signed_offsets() {
        let line = format_pipeline_event(&PipelineEvent::FrameShifted {
            file: "img2.jpg".into(),
            dx: 3,
            dy: -1,
        });
        assert_eq!(line, "    img2.jpg shifted by (+3, -1)");
    }

    #[test]
    fn tonemap_event_names_the_operator() {
        let line = format_pipeline_event(&PipelineEvent::TonemapWritten {
            operator: "Reinhard",
            path: PathBuf::from("/out/tm_Reinhard_pm.jpg"),
        });
        assert_eq!(line, "Tonemap Reinhard: /out/tm_Reinhard_pm.jpg");
    }
}
