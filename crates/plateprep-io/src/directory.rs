//! Drive the pipeline over one input directory.
//!
//! Files are visited in natural order. Each file is admitted (extension
//! check, decode, size threshold) and then fed through the pairing
//! window. Rejected files never enter the window, so a skipped sidecar
//! between a plate and its mask does not break the pair.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use plateprep_pipeline::{
    CanvasResult, ColorMode, ColorNormalizer, Compositor, ImageRecord, Outcome, OutcomeTally,
    PairWindow, PerceptualRecall, Raster, Step,
};

use crate::config::RunConfig;
use crate::decode::decode;
use crate::encode::encode_canvas;
use crate::walk::collect_files;

/// Extensions that pdfimages writes but no decoder handles: raw CCITT
/// fax streams and their `.params` sidecars.
pub const UNSUPPORTED_EXTENSIONS: [&str; 2] = ["ccitt", "params"];

/// Per-file report handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// Input file.
    pub source: PathBuf,
    /// What happened to it.
    pub outcome: Outcome,
    /// Where its canvas goes. `None` for files rejected before pairing.
    pub destination: Option<PathBuf>,
}

/// Processes directories with one configuration.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryPipeline<'a> {
    config: &'a RunConfig,
    normalizer: &'a ColorNormalizer,
    compositor: Compositor,
}

struct Sink<'s, F> {
    recall: &'s mut PerceptualRecall,
    tally: OutcomeTally,
    on_report: F,
}

impl<F: FnMut(&FileReport)> Sink<'_, F> {
    fn report(&mut self, source: &Path, outcome: Outcome, destination: Option<PathBuf>) {
        self.tally.bump(outcome);
        (self.on_report)(&FileReport {
            source: source.to_path_buf(),
            outcome,
            destination,
        });
    }
}

impl<'a> DirectoryPipeline<'a> {
    /// A pipeline writing according to `config`, converting CMYK through
    /// `normalizer`.
    #[must_use]
    pub const fn new(config: &'a RunConfig, normalizer: &'a ColorNormalizer) -> Self {
        Self {
            config,
            normalizer,
            compositor: Compositor::from_config(&config.pipeline),
        }
    }

    /// Output path for `source`: its file stem with the output format's
    /// extension, in the output directory.
    #[must_use]
    pub fn destination(&self, source: &Path) -> PathBuf {
        let stem = source.file_stem().unwrap_or_else(|| source.as_os_str());
        let mut name = stem.to_os_string();
        name.push(".");
        name.push(self.config.format.extension());
        self.config.output_dir.join(name)
    }

    /// Process every file under `dir`.
    ///
    /// `recall` carries duplicate detection across calls; pass a fresh
    /// one to deduplicate within `dir` only. `on_report` sees every
    /// counted file outcome (CMYK conversions are only tallied).
    pub fn run(
        &self,
        dir: &Path,
        recall: &mut PerceptualRecall,
        on_report: impl FnMut(&FileReport),
    ) -> OutcomeTally {
        tracing::info!(
            dir = %dir.display(),
            output_dir = %self.config.output_dir.display(),
            canvas_size = self.compositor.canvas_size(),
            "starting directory"
        );
        let selection = self.config.pipeline.selection;
        let mut sink = Sink {
            recall,
            tally: OutcomeTally::new(),
            on_report,
        };
        let mut window = PairWindow::new();

        for path in collect_files(dir) {
            let record = match self.admit(&path) {
                Ok(record) => record,
                Err(outcome) => {
                    sink.report(&path, outcome, None);
                    continue;
                }
            };

            if let Some(previous) = window.previous_mut() {
                self.normalize(previous, &mut sink.tally);
            }
            match window.observe(record) {
                Step::Idle => {}
                Step::Masked { image, mask } => {
                    tracing::debug!(
                        image = %image.path().display(),
                        mask = %mask.path().display(),
                        "paired with mask"
                    );
                    if selection.emits_masked() {
                        self.emit(&image, Some(&mask.raster), &mut sink);
                    }
                }
                Step::Unmasked(image) => {
                    tracing::debug!(image = %image.path().display(), "no mask");
                    if selection.emits_unmasked() {
                        self.emit(&image, None, &mut sink);
                    }
                }
            }
        }

        if let Some(mut last) = window.flush()
            && selection.emits_unmasked()
        {
            self.normalize(&mut last, &mut sink.tally);
            self.emit(&last, None, &mut sink);
        }

        tracing::info!(
            dir = %dir.display(),
            written = sink.tally.total(),
            "directory complete"
        );
        sink.tally
    }

    /// Decode `path` if it is a usable image, or say why not.
    fn admit(&self, path: &Path) -> Result<ImageRecord, Outcome> {
        let Some(ext) = path.extension().and_then(OsStr::to_str) else {
            tracing::debug!(path = %path.display(), "skipping unknown file type");
            return Err(Outcome::Unknown);
        };
        let ext = ext.to_ascii_lowercase();
        if UNSUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            tracing::debug!(path = %path.display(), %ext, "skipping unsupported file type");
            return Err(Outcome::Unsupported);
        }

        let record = decode(path).map_err(|err| {
            let outcome = err.outcome();
            if outcome == Outcome::Unsupported {
                tracing::debug!(error = %err, "skipping undecodable file");
            } else {
                tracing::warn!(error = %err, "decode failed");
            }
            outcome
        })?;

        let (width, height) = record.raster.dimensions();
        if f64::from(width.max(height)) <= self.config.pipeline.small_threshold() {
            tracing::debug!(path = %path.display(), width, height, "skipping small image");
            return Err(Outcome::Small);
        }
        Ok(record)
    }

    fn normalize(&self, record: &mut ImageRecord, tally: &mut OutcomeTally) {
        if record.mode() != ColorMode::Cmyk {
            return;
        }
        tally.bump(Outcome::Cmyk);
        if let Err(violation) = self.normalizer.normalize(record) {
            tracing::error!(error = %violation, "CMYK normalization aborted");
        }
    }

    fn emit<F: FnMut(&FileReport)>(
        &self,
        image: &ImageRecord,
        mask: Option<&Raster>,
        sink: &mut Sink<'_, F>,
    ) {
        let destination = self.destination(image.path());
        let output_exists = self.config.pipeline.keep_existing && destination.exists();

        let outcome =
            match self
                .compositor
                .compose(&image.raster, mask, sink.recall, output_exists)
            {
                Ok(CanvasResult {
                    outcome,
                    canvas: Some(canvas),
                }) => match encode_canvas(
                    &canvas,
                    &destination,
                    self.config.format,
                    &self.config.save_params,
                ) {
                    Ok(()) => outcome,
                    Err(err) => {
                        tracing::warn!(error = %err, "write failed");
                        Outcome::Failed
                    }
                },
                Ok(result) => result.outcome,
                Err(violation) => {
                    tracing::error!(
                        path = %image.path().display(),
                        error = %violation,
                        "internal error"
                    );
                    Outcome::Failed
                }
            };
        sink.report(image.path(), outcome, Some(destination));
    }
}
