//! plateprep: turn `pdfimages` output into square training images.
//!
//! Walks one or more directories of sequentially numbered images
//! extracted from PDFs, pairs each color plate with the grayscale mask
//! that follows it, drops duplicates and writes every kept image onto a
//! fixed-size square canvas.
//!
//! # Usage
//!
//! ```text
//! plateprep [OPTIONS] <DIR>...
//! ```
//!
//! Process all images, with transparent padding, at 720x720:
//!
//! ```text
//! plateprep -a -t -s 720 book/
//! ```
//!
//! Only unmasked images at least 75% of the default 512x512 size:
//!
//! ```text
//! plateprep -u -q 0.75 book/
//! ```
//!
//! Convert CMYK plates through a press profile:
//!
//! ```text
//! plateprep -a -C USWebCoatedSWOP.icc book/
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use plateprep_io::{
    ConfigError, DirectoryPipeline, FileReport, OutputFormat, RunConfig, SaveParams,
};
use plateprep_pipeline::{
    ColorNormalizer, Outcome, OutcomeTally, PerceptualRecall, PipelineConfig, Selection,
};
use tracing_subscriber::EnvFilter;

/// Assemble pdfimages output into uniformly sized training images.
///
/// Each directory (including subdirectories) is read in numeric file
/// order. A grayscale or bilevel image right after a color image of the
/// same size is treated as its mask.
#[derive(Parser)]
#[command(name = "plateprep", version)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// The image directories to read, including all subdirectories.
    #[arg(value_name = "DIR", required = true)]
    image_dirs: Vec<PathBuf>,

    /// Also process images that lack a mask (lots of extra images!).
    #[arg(short = 'a', long)]
    all: bool,

    /// Only process unmasked images (incompatible with --all).
    #[arg(short = 'u', long)]
    unmasked: bool,

    /// Keep existing output images instead of overwriting them.
    #[arg(short = 'k', long)]
    keep: bool,

    /// Pad with a transparent border when the image does not fill the
    /// canvas (PNG only).
    #[arg(short = 't', long)]
    transparent: bool,

    /// Width and height of the output images.
    #[arg(
        short = 's',
        long,
        default_value_t = PipelineConfig::DEFAULT_CANVAS_SIZE,
        value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..)
    )]
    output_size: u32,

    /// Minimum fraction of --output-size an image's longer side must
    /// exceed to be kept.
    #[arg(short = 'q', long, value_name = "VALUE", default_value_t = PipelineConfig::DEFAULT_MINIMUM_QUALITY)]
    quality: f64,

    /// Where to store results (must exist).
    #[arg(short = 'o', long, value_name = "PATH", default_value = RunConfig::DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Image format to save as (png, jpeg, bmp, webp).
    #[arg(short = 'f', long, default_value_t = OutputFormat::Png)]
    save_format: OutputFormat,

    /// Comma-separated name=value encoder parameters, e.g.
    /// `quality=90` for JPEG or `compress_level=9` for PNG.
    #[arg(short = 'P', long, value_name = "VALUES")]
    save_params: Option<String>,

    /// ICC profile for CMYK images that carry none.
    #[arg(short = 'C', long, value_name = "ICC_FILE")]
    cmyk_color_profile: Option<PathBuf>,

    /// ICC profile to convert CMYK images into (built-in sRGB if unset).
    #[arg(short = 'S', long, value_name = "ICC_FILE")]
    srgb_color_profile: Option<PathBuf>,

    /// Do not convert anything, only list duplicate images.
    #[arg(short = 'F', long)]
    find_duplicates: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, --all, --unmasked, --keep, --transparent,
    /// --output-size, --quality and --find-duplicates are ignored. The
    /// JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Print each directory's tally as JSON instead of a summary.
    #[arg(long)]
    json: bool,

    /// Log debug detail to stderr.
    #[arg(short = 'v', long)]
    verbose: bool,
}

/// Build a [`RunConfig`] from CLI arguments and validate it.
fn config_from_cli(cli: &Cli) -> Result<RunConfig, String> {
    let pipeline = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        PipelineConfig {
            canvas_size: cli.output_size,
            minimum_quality: cli.quality,
            transparent: cli.transparent,
            keep_existing: cli.keep,
            selection: Selection::from_flags(cli.all, cli.unmasked)
                .map_err(|e| e.to_string())?,
            find_duplicates: cli.find_duplicates,
        }
    };

    let save_params = match cli.save_params {
        Some(ref raw) => SaveParams::parse(cli.save_format, raw)
            .map_err(|e| ConfigError::from(e).to_string())?,
        None => SaveParams::default(),
    };

    for (kind, path) in [
        ("CMYK", &cli.cmyk_color_profile),
        ("sRGB", &cli.srgb_color_profile),
    ] {
        if let Some(path) = path
            && !path.exists()
        {
            return Err(ConfigError::MissingProfile {
                kind,
                path: path.clone(),
            }
            .to_string());
        }
    }

    let config = RunConfig {
        pipeline,
        output_dir: cli.output_dir.clone(),
        format: cli.save_format,
        save_params,
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Human-readable label for an outcome in the summary.
const fn label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Unknown => "Unknown file types",
        Outcome::Unsupported => "Known, but unsupported files",
        Outcome::Small => "Images that were too small",
        Outcome::Cmyk => "CMYK color space images converted",
        Outcome::Masked => "Masked images composited",
        Outcome::Skipped => "Skipped",
        Outcome::Duplicate => "Duplicate image",
        Outcome::Failed => "Processing failed",
        Outcome::Normal => "Images with no mask processed",
    }
}

/// Summary lines for `tally`, alphabetical by tag, including the total
/// of written images.
fn summary_lines(tally: &OutcomeTally) -> Vec<String> {
    let mut rows: Vec<(&str, &str, usize)> = tally
        .iter()
        .map(|(outcome, count)| (outcome.tag(), label(outcome), count))
        .collect();
    rows.push(("total", "Total number of processed images", tally.total()));
    rows.sort_by_key(|&(tag, _, _)| tag);
    rows.into_iter()
        .map(|(_, label, count)| format!("{label}: {count}"))
        .collect()
}

/// Per-file line, or `None` when nothing should be printed.
fn report_line(report: &FileReport, find_duplicates: bool) -> Option<String> {
    if find_duplicates {
        return (report.outcome == Outcome::Duplicate).then(|| {
            report
                .destination
                .as_deref()
                .unwrap_or(&report.source)
                .display()
                .to_string()
        });
    }
    Some(match report.destination {
        Some(ref destination) => format!(
            "  image processing {}, outfile: {}",
            report.outcome,
            destination.display()
        ),
        None => format!(
            "  skipping {} ({})",
            report.source.display(),
            report.outcome
        ),
    })
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "plateprep=debug"
    } else {
        "plateprep=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn process_dir(
    dir: &Path,
    pipeline: &DirectoryPipeline<'_>,
    recall: &mut PerceptualRecall,
    cli: &Cli,
    find_duplicates: bool,
) -> Result<(), String> {
    let dir = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
    if !cli.json {
        println!("Processing from {}", dir.display());
    }

    let tally = pipeline.run(&dir, recall, |report| {
        if !cli.json
            && let Some(line) = report_line(report, find_duplicates)
        {
            println!("{line}");
        }
    });

    if cli.json {
        let value = serde_json::json!({
            "directory": dir,
            "outcomes": tally,
            "total": tally.total(),
        });
        let json = serde_json::to_string_pretty(&value)
            .map_err(|e| format!("Error serializing tally: {e}"))?;
        println!("{json}");
    } else {
        println!("\n{} processing complete.", dir.display());
        for line in summary_lines(&tally) {
            println!("{line}");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(?config, "resolved configuration");

    let normalizer = match ColorNormalizer::from_profile_files(
        cli.cmyk_color_profile.as_deref(),
        cli.srgb_color_profile.as_deref(),
    ) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let pipeline = DirectoryPipeline::new(&config, &normalizer);
    // One recall for the whole invocation: duplicates are found across
    // directories too.
    let mut recall = PerceptualRecall::new();
    for dir in &cli.image_dirs {
        if let Err(msg) = process_dir(
            dir,
            &pipeline,
            &mut recall,
            &cli,
            config.pipeline.find_duplicates,
        ) {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
