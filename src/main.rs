use clap::{Parser, Subcommand};
use hdr_stack::metadata::{EmbeddedExifReader, ExifToolReader, MetadataReader};
use hdr_stack::{collect, config, output, pipeline};
use std::path::PathBuf;

/// Tone-map overrides shared by the commands that render JPEGs.
/// Unset flags fall through to `hdr-stack.toml`, then to stock defaults.
#[derive(clap::Args, Clone)]
struct TonemapArgs {
    /// Gamma-only operator exponent (> 0)
    #[arg(long)]
    gamma: Option<f32>,

    /// Reinhard post-compression gamma (> 0)
    #[arg(long)]
    reinhard_gamma: Option<f32>,

    /// Reinhard brightness, -8 to 8 (higher = brighter)
    #[arg(long)]
    reinhard_intensity: Option<f32>,

    /// Reinhard light adaptation, 0 (global) to 1 (per pixel)
    #[arg(long)]
    reinhard_light_adapt: Option<f32>,

    /// Reinhard chromatic adaptation, 0 (shared) to 1 (per channel)
    #[arg(long)]
    reinhard_color_adapt: Option<f32>,
}

impl TonemapArgs {
    fn apply(&self, config: &mut config::TonemapConfig) {
        if let Some(v) = self.gamma {
            config.gamma = v;
        }
        if let Some(v) = self.reinhard_gamma {
            config.reinhard_gamma = v;
        }
        if let Some(v) = self.reinhard_intensity {
            config.reinhard_intensity = v;
        }
        if let Some(v) = self.reinhard_light_adapt {
            config.reinhard_light_adapt = v;
        }
        if let Some(v) = self.reinhard_color_adapt {
            config.reinhard_color_adapt = v;
        }
    }
}

#[derive(Parser)]
#[command(name = "hdr-stack")]
#[command(about = "Merge a bracketed exposure series into an HDR radiance image")]
#[command(long_about = "\
Merge a bracketed exposure series into an HDR radiance image

Point hdr-stack at a folder of differently-exposed frames of the same
scene. Frames are ordered naturally (img2 before img10), exposure times
come from image metadata, and the output is a Radiance .hdr plus two
tone-mapped JPEGs:

  brackets/
  ├── img1.jpg                     # 1/125s
  ├── img2.jpg                     # 1/30s
  ├── img10.jpg                    # 1/8s
  ├── CRF.txt                      # camera response (written on first merge)
  ├── hdr-stack.toml               # optional config
  └── Analysis_Results/            # result folder (override with --results)
      ├── pm.hdr
      ├── tm_Gamma_pm.jpg
      └── tm_Reinhard_pm.jpg

Exposure metadata (first configured wins):
  --exiftool PATH   run an exiftool-style tool per frame and parse its output
  (no exiftool)     read the embedded EXIF ExposureTime directly

Run 'hdr-stack gen-config' to generate a documented hdr-stack.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing the bracketed frames
    #[arg(long, default_value = ".", global = true)]
    input: PathBuf,

    /// Filename suffix selecting bracket frames (overrides config)
    #[arg(long, global = true)]
    ext: Option<String>,

    /// Path to an exiftool-style metadata executable (overrides config)
    #[arg(long, global = true)]
    exiftool: Option<PathBuf>,

    /// Config file (defaults to <input>/hdr-stack.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List frames with their exposure times and write exposures.json
    Collect,
    /// Run the full pipeline: collect, align, merge, tone map
    Merge {
        /// Precomputed camera response file; skips calibration
        #[arg(long)]
        crf: Option<PathBuf>,

        /// Base name for output artifacts (default: hdrDebevec)
        #[arg(long)]
        name: Option<String>,

        /// Result folder (default: <input>/Analysis_Results)
        #[arg(long)]
        results: Option<PathBuf>,

        #[command(flatten)]
        tonemap: TonemapArgs,
    },
    /// Re-tone-map an existing .hdr file
    Tonemap {
        /// The .hdr file to tone map
        hdr: PathBuf,

        /// Base name for output artifacts (default: hdrDebevec)
        #[arg(long)]
        name: Option<String>,

        /// Result folder (default: <input>/Analysis_Results)
        #[arg(long)]
        results: Option<PathBuf>,

        #[command(flatten)]
        tonemap: TonemapArgs,
    },
    /// Validate the bracket (ordering, metadata, decodability) without writing
    Check,
    /// Print a stock hdr-stack.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut run_config = match &cli.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(&cli.input)?,
    };
    if let Some(ext) = &cli.ext {
        run_config.collect.extension = ext.clone();
    }
    if let Some(tool) = &cli.exiftool {
        run_config.collect.exiftool = Some(tool.clone());
    }

    match cli.command {
        Command::Collect => {
            run_config.validate()?;
            let reader = make_reader(&run_config.collect);
            let collection =
                collect::collect(&cli.input, &run_config.collect.extension, reader.as_ref())?;
            output::print_collect_output(&collection);
            let manifest_path = cli.input.join("exposures.json");
            collection.write_manifest(&manifest_path)?;
            println!("Manifest written: {}", manifest_path.display());
        }
        Command::Merge {
            crf,
            name,
            results,
            tonemap,
        } => {
            tonemap.apply(&mut run_config.tonemap);
            run_config.validate()?;

            println!("==> Collecting {}", cli.input.display());
            let reader = make_reader(&run_config.collect);
            let mut collection =
                collect::collect(&cli.input, &run_config.collect.extension, reader.as_ref())?;
            output::print_collect_output(&collection);

            let result_dir = results.unwrap_or_else(|| pipeline::default_result_dir(&cli.input));
            println!("==> Merging into {}", result_dir.display());
            pipeline::run(
                &mut collection,
                &cli.input,
                &result_dir,
                crf.as_deref(),
                name.as_deref(),
                &run_config.tonemap,
                &mut |event| output::print_pipeline_event(&event),
            )?;
            println!("==> Merge complete: {}", result_dir.display());
        }
        Command::Tonemap {
            hdr,
            name,
            results,
            tonemap,
        } => {
            tonemap.apply(&mut run_config.tonemap);
            run_config.validate()?;

            let result_dir = results.unwrap_or_else(|| pipeline::default_result_dir(&cli.input));
            pipeline::retonemap(
                &hdr,
                &result_dir,
                name.as_deref(),
                &run_config.tonemap,
                &mut |event| output::print_pipeline_event(&event),
            )?;
            println!("==> Tonemap complete: {}", result_dir.display());
        }
        Command::Check => {
            run_config.validate()?;
            println!("==> Checking {}", cli.input.display());
            let reader = make_reader(&run_config.collect);
            let collection =
                collect::collect(&cli.input, &run_config.collect.extension, reader.as_ref())?;
            output::print_collect_output(&collection);
            println!("==> Bracket is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Pick the metadata adapter: subprocess when an exiftool path is
/// configured, embedded EXIF otherwise.
fn make_reader(collect_config: &config::CollectConfig) -> Box<dyn MetadataReader> {
    match &collect_config.exiftool {
        Some(tool) => Box::new(ExifToolReader::new(tool)),
        None => Box::new(EmbeddedExifReader),
    }
}
