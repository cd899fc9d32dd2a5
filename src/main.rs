use clap::{Parser, Subcommand};
use rayon::prelude::*;
use slimshot::outcome::OutcomeSummary;
use slimshot::{CompressConfig, Compressor, Platform, SourceImage, config, output};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "slimshot")]
#[command(about = "Adaptive, face-aware image re-encoding")]
#[command(long_about = "\
Adaptive, face-aware image re-encoding

Produces smaller files at the same perceived quality. Images are downscaled
to fit the target profile, faces get a quality boost, and files that would
not meaningfully shrink are returned untouched.

Pipeline:
  normalize → decode → detect faces → resize → encode → decide

HEIC/HEIF/AVIF inputs are converted losslessly first, then encoded with a
quality search until the result beats the original file size.

Platform profiles:
  default     max_dimension from config, base quality from config
  instagram   1440x1800, quality 92, saturation +8%
  linkedin    1200x1200, quality 90, saturation +2%
  tiktok      1080x1920, quality 88, saturation +5%

Run 'slimshot gen-config' to generate a documented slimshot.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = "slimshot.toml", global = true)]
    config: PathBuf,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// SeetaFace model file; overrides faces.model_path from the config
    #[arg(long, global = true)]
    face_model: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress a single image
    Compress {
        input: PathBuf,
        #[arg(long, value_enum, default_value_t = Platform::Default)]
        platform: Platform,
        /// Output file (default: <stem>.min.<ext> next to the input)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Compress many images in parallel; directories are walked recursively
    ///
    /// Outputs keep their path relative to the walked directory. Names that
    /// would collide get a numeric suffix (photo.jpg, photo-1.jpg).
    Batch {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = Platform::Default)]
        platform: Platform,
        /// Output directory
        #[arg(long, default_value = "slimshot-out")]
        out_dir: PathBuf,
    },
    /// Print a stock slimshot.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Compress {
            input,
            platform,
            output: output_path,
        } => {
            let config = load_config(&cli.config, cli.face_model)?;
            let compressor = Compressor::from_config(config);
            let source = SourceImage::from_path(&input)?;
            let outcome = compressor.compress(&source, platform)?;

            let target = output_path.unwrap_or_else(|| {
                default_output_path(&input, outcome.payload.extension())
            });
            outcome.payload.write_to(&target)?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome.summary(&source.file_name))?
                );
            } else {
                output::print_outcome(&source.file_name, &outcome, Some(&target));
            }
        }
        Command::Batch {
            inputs,
            platform,
            out_dir,
        } => {
            let config = load_config(&cli.config, cli.face_model)?;
            init_thread_pool(&config.processing);
            let compressor = Compressor::from_config(config);

            let jobs = plan_batch(&collect_images(&inputs), &out_dir);
            let results: Vec<_> = jobs
                .par_iter()
                .map(|job| run_job(&compressor, job, platform))
                .collect();

            let mut summaries = Vec::new();
            let mut failed = 0;
            for (job, result) in jobs.iter().zip(results) {
                match result {
                    Ok((summary, lines)) => {
                        if !cli.json {
                            for line in &lines {
                                println!("{line}");
                            }
                        }
                        summaries.push(summary);
                    }
                    Err(e) => {
                        failed += 1;
                        output::print_failure(&job.input.display().to_string(), &*e);
                    }
                }
            }

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                output::print_batch_summary(&summaries, failed);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the fmt subscriber. `RUST_LOG` wins over `-v` when set.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,slimshot={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. Users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// `photos/IMG_1.HEIC` → `photos/IMG_1.min.jpg`
fn default_output_path(input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{stem}.min.{extension}"))
}

/// Load the config file, then apply command-line overrides.
fn load_config(
    path: &Path,
    face_model: Option<PathBuf>,
) -> Result<CompressConfig, config::ConfigError> {
    let mut config = config::load_config(path)?;
    if face_model.is_some() {
        config.faces.model_path = face_model;
    }
    Ok(config)
}

/// An image found on disk and its output path relative to the walked root.
#[derive(Debug, Clone, PartialEq)]
struct FoundImage {
    path: PathBuf,
    relative: PathBuf,
}

/// Expand directories into the image files beneath them, sorted. Plain
/// file inputs are relative to their own directory.
fn collect_images(inputs: &[PathBuf]) -> Vec<FoundImage> {
    let mut images = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<FoundImage> = WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| !slimshot::types::mime_for_extension(e).is_empty())
                })
                .map(|path| {
                    let relative = path.strip_prefix(input).unwrap_or(&path).to_path_buf();
                    FoundImage { path, relative }
                })
                .collect();
            found.sort_by(|a, b| a.path.cmp(&b.path));
            images.extend(found);
        } else {
            let relative = input
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| input.clone());
            images.push(FoundImage {
                path: input.clone(),
                relative,
            });
        }
    }
    images
}

/// One batch input and where its output goes, minus the extension.
#[derive(Debug, Clone, PartialEq)]
struct BatchJob {
    input: PathBuf,
    target_base: PathBuf,
}

impl BatchJob {
    /// The extension depends on the outcome (JPEG, or the original format
    /// when the original is kept), so it is appended, never substituted.
    fn target(&self, extension: &str) -> PathBuf {
        let mut name = OsString::from(self.target_base.as_os_str());
        name.push(".");
        name.push(extension);
        PathBuf::from(name)
    }
}

/// Assign every image a distinct output base under `out_dir`.
///
/// Bases ignore the input extension, so `x.jpg` and `x.png` collide and the
/// later one becomes `x-1`. Assignment follows input order.
fn plan_batch(images: &[FoundImage], out_dir: &Path) -> Vec<BatchJob> {
    let mut taken = HashSet::new();
    images
        .iter()
        .map(|image| BatchJob {
            input: image.path.clone(),
            target_base: claim_base(out_dir.join(image.relative.with_extension("")), &mut taken),
        })
        .collect()
}

fn claim_base(base: PathBuf, taken: &mut HashSet<PathBuf>) -> PathBuf {
    if taken.insert(base.clone()) {
        return base;
    }
    let stem = base
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let mut n = 1;
    loop {
        let candidate = base.with_file_name(format!("{stem}-{n}"));
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

type JobError = Box<dyn std::error::Error + Send + Sync>;

/// Read, compress, and write one file. Only the summary and the rendered
/// lines outlive the call; source and payload bytes are dropped here.
fn run_job(
    compressor: &Compressor,
    job: &BatchJob,
    platform: Platform,
) -> Result<(OutcomeSummary, Vec<String>), JobError> {
    let source = SourceImage::from_path(&job.input)?;
    let outcome = compressor.compress(&source, platform)?;
    let target = job.target(outcome.payload.extension());
    outcome.payload.write_to(&target)?;

    let name = job.input.display().to_string();
    let lines = output::format_outcome(&name, &outcome, Some(&target));
    Ok((outcome.summary(&name), lines))
}
