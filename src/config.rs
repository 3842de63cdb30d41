//! Run configuration.
//!
//! Handles loading and validating `hdr-stack.toml`. All knobs have stock
//! defaults; a config file only overrides the values it names, and CLI
//! flags override the file (resolution happens in `main`).
//!
//! ## Config File Location
//!
//! `hdr-stack.toml` is looked up in the input directory, or anywhere via
//! `--config`:
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [collect]
//! extension = ".jpg"            # Which files participate in the bracket
//! # exiftool = "/usr/bin/exiftool"  # Metadata subprocess; omit to parse
//!                                   # embedded EXIF directly
//!
//! [tonemap]
//! gamma = 2.2                   # Gamma-only operator exponent (> 0)
//! reinhard_gamma = 1.0          # Reinhard post-gamma (> 0)
//! reinhard_intensity = 1.0      # Brightness, -8 to 8 (higher = brighter)
//! reinhard_light_adapt = 0.0    # 1 = per-pixel adaptation, 0 = global
//! reinhard_color_adapt = 0.0    # 1 = per-channel adaptation, 0 = shared
//! ```
//!
//! Unknown keys are rejected to catch typos early. Ranges are validated
//! once here, at the boundary — the operators trust their inputs.

use crate::operators::tonemap::ReinhardParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Stock config filename, looked up in the input directory.
pub const CONFIG_FILE_NAME: &str = "hdr-stack.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full run configuration loaded from `hdr-stack.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Input collection settings.
    pub collect: CollectConfig,
    /// Tone-mapping operator knobs.
    pub tonemap: TonemapConfig,
}

/// Input collection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectConfig {
    /// Filename suffix that selects bracket frames.
    pub extension: String,
    /// Path to an exiftool-style metadata executable. When absent, exposure
    /// times are parsed from embedded EXIF instead of a subprocess.
    pub exiftool: Option<PathBuf>,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            extension: ".jpg".to_string(),
            exiftool: None,
        }
    }
}

/// Tone-mapping operator knobs. See the module docs for ranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TonemapConfig {
    /// Gamma-only operator exponent. Must be positive; 2.2 suits sRGB
    /// displays.
    pub gamma: f32,
    /// Gamma applied after Reinhard range compression. Must be positive.
    pub reinhard_gamma: f32,
    /// Reinhard brightness in [-8, 8]; higher produces brighter results.
    pub reinhard_intensity: f32,
    /// Reinhard light adaptation in [0, 1]: 1 adapts per pixel, 0 globally.
    pub reinhard_light_adapt: f32,
    /// Reinhard chromatic adaptation in [0, 1]: 1 treats channels
    /// independently, 0 shares one level.
    pub reinhard_color_adapt: f32,
}

impl Default for TonemapConfig {
    fn default() -> Self {
        Self {
            gamma: 2.2,
            reinhard_gamma: 1.0,
            reinhard_intensity: 1.0,
            reinhard_light_adapt: 0.0,
            reinhard_color_adapt: 0.0,
        }
    }
}

impl TonemapConfig {
    pub fn reinhard_params(&self) -> ReinhardParams {
        ReinhardParams {
            gamma: self.reinhard_gamma,
            intensity: self.reinhard_intensity,
            light_adapt: self.reinhard_light_adapt,
            color_adapt: self.reinhard_color_adapt,
        }
    }
}

impl RunConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.tonemap;
        if !(t.gamma > 0.0 && t.gamma.is_finite()) {
            return Err(ConfigError::Validation(
                "tonemap.gamma must be a positive number".into(),
            ));
        }
        if !(t.reinhard_gamma > 0.0 && t.reinhard_gamma.is_finite()) {
            return Err(ConfigError::Validation(
                "tonemap.reinhard_gamma must be a positive number".into(),
            ));
        }
        if !(-8.0..=8.0).contains(&t.reinhard_intensity) {
            return Err(ConfigError::Validation(
                "tonemap.reinhard_intensity must be in [-8, 8]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&t.reinhard_light_adapt) {
            return Err(ConfigError::Validation(
                "tonemap.reinhard_light_adapt must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&t.reinhard_color_adapt) {
            return Err(ConfigError::Validation(
                "tonemap.reinhard_color_adapt must be in [0, 1]".into(),
            ));
        }
        if self.collect.extension.is_empty() {
            return Err(ConfigError::Validation(
                "collect.extension must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Load config from `dir/hdr-stack.toml`, or defaults if absent.
pub fn load_config(dir: &Path) -> Result<RunConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        load_config_file(&path)
    } else {
        Ok(RunConfig::default())
    }
}

/// Load and validate a specific config file.
pub fn load_config_file(path: &Path) -> Result<RunConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: RunConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// A documented stock `hdr-stack.toml`, printed by `gen-config`.
pub fn stock_config_toml() -> String {
    let defaults = TonemapConfig::default();
    format!(
        r#"# hdr-stack configuration
# Place this file in the bracket directory (or pass --config).
# Every option is optional; defaults are shown.

[collect]
# Which files participate in the bracket.
extension = ".jpg"

# Path to an exiftool-style metadata executable, invoked once per frame
# as `exiftool <file>`. Omit to parse embedded EXIF directly.
# exiftool = "/usr/bin/exiftool"

[tonemap]
# Gamma-only operator exponent (> 0). 2.2 suits sRGB displays.
gamma = {gamma:?}

# Reinhard operator knobs.
reinhard_gamma = {rg:?}          # post-compression gamma (> 0)
reinhard_intensity = {ri:?}      # brightness, -8 to 8 (higher = brighter)
reinhard_light_adapt = {rl:?}    # 1 = per-pixel adaptation, 0 = global
reinhard_color_adapt = {rc:?}    # 1 = per-channel adaptation, 0 = shared
"#,
        gamma = defaults.gamma,
        rg = defaults.reinhard_gamma,
        ri = defaults.reinhard_intensity,
        rl = defaults.reinhard_light_adapt,
        rc = defaults.reinhard_color_adapt,
    )
}
