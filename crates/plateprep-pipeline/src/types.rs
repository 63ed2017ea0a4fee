//! Shared types for the plateprep pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use image::{RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::raster::{ColorMode, Raster};

/// One decoded file from the input directory.
///
/// Records are created by the decoder, normalized in place (CMYK to RGB)
/// and flagged when they are consumed as the mask of the preceding record.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// Source path, used for output naming and reporting.
    pub path: PathBuf,
    /// Decoded pixels.
    pub raster: Raster,
    /// ICC profile embedded in the source file, if any.
    pub icc_profile: Option<Vec<u8>>,
    /// Set once this record has been used as a mask.
    pub is_mask: bool,
}

impl ImageRecord {
    /// Create an unflagged record without an embedded profile.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, raster: Raster) -> Self {
        Self {
            path: path.into(),
            raster,
            icc_profile: None,
            is_mask: false,
        }
    }

    /// Attach the embedded ICC profile.
    #[must_use]
    pub fn with_icc_profile(mut self, icc_profile: Option<Vec<u8>>) -> Self {
        self.icc_profile = icc_profile;
        self
    }

    /// Source path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Color mode of the current pixels.
    #[must_use]
    pub const fn mode(&self) -> ColorMode {
        self.raster.mode()
    }
}

/// What happened to one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// An unmasked image was written.
    Normal,
    /// An image composited with its mask was written.
    Masked,
    /// The image matched a fingerprint already seen.
    Duplicate,
    /// The image was below the size threshold, or scaled to nothing.
    Small,
    /// The destination already existed and was kept.
    Skipped,
    /// A CMYK image was converted to RGB (counted in addition to the
    /// file's final outcome).
    Cmyk,
    /// A recognized but unsupported file (e.g. CCITT data, parameter
    /// sidecars, undecodable content).
    Unsupported,
    /// A file without an extension.
    Unknown,
    /// Processing failed.
    Failed,
}

impl Outcome {
    /// Every outcome, in tag order.
    pub const ALL: [Self; 9] = [
        Self::Normal,
        Self::Masked,
        Self::Duplicate,
        Self::Small,
        Self::Skipped,
        Self::Cmyk,
        Self::Unsupported,
        Self::Unknown,
        Self::Failed,
    ];

    /// The lowercase tag used in reports.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Masked => "masked",
            Self::Duplicate => "duplicate",
            Self::Small => "small",
            Self::Skipped => "skipped",
            Self::Cmyk => "cmyk",
            Self::Unsupported => "unsupported",
            Self::Unknown => "unknown",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Per-outcome counters for one directory run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTally(BTreeMap<Outcome, usize>);

impl OutcomeTally {
    /// An empty tally.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Count one occurrence of `outcome`.
    pub fn bump(&mut self, outcome: Outcome) {
        *self.0.entry(outcome).or_insert(0) += 1;
    }

    /// How many times `outcome` was recorded.
    #[must_use]
    pub fn get(&self, outcome: Outcome) -> usize {
        self.0.get(&outcome).copied().unwrap_or(0)
    }

    /// Images that produced output: `masked + normal`.
    #[must_use]
    pub fn total(&self) -> usize {
        self.get(Outcome::Masked) + self.get(Outcome::Normal)
    }

    /// Recorded outcomes and their counts, in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (Outcome, usize)> + '_ {
        self.0.iter().map(|(outcome, count)| (*outcome, *count))
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The final square image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Canvas {
    /// Opaque output.
    Rgb(RgbImage),
    /// Output with a transparent border.
    Rgba(RgbaImage),
}

impl Canvas {
    /// `(width, height)` in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Rgb(img) => img.dimensions(),
            Self::Rgba(img) => img.dimensions(),
        }
    }

    /// [`ColorMode::Rgb`] or [`ColorMode::Rgba`].
    #[must_use]
    pub const fn mode(&self) -> ColorMode {
        match self {
            Self::Rgb(_) => ColorMode::Rgb,
            Self::Rgba(_) => ColorMode::Rgba,
        }
    }
}

/// Result of composing one image.
///
/// `canvas` is present only for outcomes that should be written
/// (`normal` and `masked` outside find-duplicates mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasResult {
    /// What happened.
    pub outcome: Outcome,
    /// Pixels to write, if any.
    pub canvas: Option<Canvas>,
}

impl CanvasResult {
    /// A result with nothing to write.
    #[must_use]
    pub const fn empty(outcome: Outcome) -> Self {
        Self {
            outcome,
            canvas: None,
        }
    }
}

/// Which images of a directory get written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Selection {
    /// Only images that have a mask.
    #[default]
    MaskedOnly,
    /// Masked images and images without a mask.
    All,
    /// Only images without a mask.
    UnmaskedOnly,
}

impl Selection {
    /// Resolve the `--all` / `--unmasked` flag pair.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if both flags are set.
    pub fn from_flags(all: bool, unmasked: bool) -> Result<Self, PipelineError> {
        match (all, unmasked) {
            (true, true) => Err(PipelineError::InvalidConfig(
                "cannot combine --all and --unmasked, choose one".to_owned(),
            )),
            (true, false) => Ok(Self::All),
            (false, true) => Ok(Self::UnmaskedOnly),
            (false, false) => Ok(Self::MaskedOnly),
        }
    }

    /// Whether image/mask composites are written.
    #[must_use]
    pub const fn emits_masked(self) -> bool {
        !matches!(self, Self::UnmaskedOnly)
    }

    /// Whether images without a mask are written.
    #[must_use]
    pub const fn emits_unmasked(self) -> bool {
        !matches!(self, Self::MaskedOnly)
    }
}

/// Configuration for the pairing and normalization pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Width and height of every output canvas.
    pub canvas_size: u32,

    /// Images whose longer side is at most `canvas_size * minimum_quality`
    /// are rejected as `small`.
    pub minimum_quality: f64,

    /// Pad with a transparent border (requires an alpha-capable format).
    pub transparent: bool,

    /// Leave existing output files untouched.
    pub keep_existing: bool,

    /// Which images are written.
    pub selection: Selection,

    /// Only look for duplicates; nothing is scaled or written.
    pub find_duplicates: bool,
}

impl PipelineConfig {
    /// Default output canvas size in pixels.
    pub const DEFAULT_CANVAS_SIZE: u32 = 512;

    /// Default minimum fraction of the canvas an input must reach.
    pub const DEFAULT_MINIMUM_QUALITY: f64 = 0.5;

    /// Inputs whose longer side is at or below this many pixels are `small`.
    #[must_use]
    pub fn small_threshold(&self) -> f64 {
        f64::from(self.canvas_size) * self.minimum_quality
    }

    /// Check field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for a zero canvas size or a
    /// quality fraction outside `0.0..=1.0`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.canvas_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "canvas size must be positive".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&self.minimum_quality) {
            return Err(PipelineError::InvalidConfig(format!(
                "minimum quality must be between 0 and 1, got {}",
                self.minimum_quality
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            canvas_size: Self::DEFAULT_CANVAS_SIZE,
            minimum_quality: Self::DEFAULT_MINIMUM_QUALITY,
            transparent: false,
            keep_existing: false,
            selection: Selection::default(),
            find_duplicates: false,
        }
    }
}

/// A broken internal precondition.
///
/// These never come from bad input; they abort the current file and are
/// reported as defects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// Autocrop computed an empty or out-of-bounds rectangle.
    #[error(
        "internal error: cannot crop {width}x{height} image to ({left}, {top}, {right}, {bottom})"
    )]
    InvertedCrop {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
        /// Left edge (inclusive).
        left: u32,
        /// Top edge (inclusive).
        top: u32,
        /// Right edge (exclusive).
        right: u32,
        /// Bottom edge (exclusive).
        bottom: u32,
    },

    /// Color conversion was requested for a record already used as a mask.
    #[error("internal error: cannot convert a mask ({}) to RGB", path.display())]
    MaskColorConversion {
        /// The mask's source path.
        path: PathBuf,
    },

    /// An image and its mask differ in size.
    #[error("internal error: mask is {mask:?} but image is {image:?}")]
    MaskSizeMismatch {
        /// Image `(width, height)`.
        image: (u32, u32),
        /// Mask `(width, height)`.
        mask: (u32, u32),
    },
}

/// Errors that can occur while configuring or running the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// An internal precondition was violated.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_and_totals() {
        let mut tally = OutcomeTally::new();
        assert!(tally.is_empty());
        tally.bump(Outcome::Masked);
        tally.bump(Outcome::Masked);
        tally.bump(Outcome::Normal);
        tally.bump(Outcome::Duplicate);
        assert_eq!(tally.get(Outcome::Masked), 2);
        assert_eq!(tally.get(Outcome::Small), 0);
        assert_eq!(tally.total(), 3);
        let recorded: Vec<_> = tally.iter().map(|(o, _)| o).collect();
        assert_eq!(
            recorded,
            vec![Outcome::Normal, Outcome::Masked, Outcome::Duplicate]
        );
    }

    #[test]
    fn tally_serializes_with_tag_keys() {
        let mut tally = OutcomeTally::new();
        tally.bump(Outcome::Unsupported);
        let json = serde_json::to_string(&tally).unwrap();
        assert_eq!(json, r#"{"unsupported":1}"#);
    }

    #[test]
    fn outcome_tags_match_display() {
        for outcome in Outcome::ALL {
            assert_eq!(outcome.to_string(), outcome.tag());
        }
    }

    #[test]
    fn selection_flags() {
        assert_eq!(Selection::from_flags(false, false).unwrap(), Selection::MaskedOnly);
        assert_eq!(Selection::from_flags(true, false).unwrap(), Selection::All);
        assert_eq!(Selection::from_flags(false, true).unwrap(), Selection::UnmaskedOnly);
        assert!(matches!(
            Selection::from_flags(true, true),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn selection_emission_policy() {
        assert!(Selection::MaskedOnly.emits_masked());
        assert!(!Selection::MaskedOnly.emits_unmasked());
        assert!(Selection::All.emits_masked());
        assert!(Selection::All.emits_unmasked());
        assert!(!Selection::UnmaskedOnly.emits_masked());
        assert!(Selection::UnmaskedOnly.emits_unmasked());
    }

    #[test]
    fn default_config_threshold() {
        let config = PipelineConfig::default();
        assert!((config.small_threshold() - 256.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_bad_values() {
        let zero = PipelineConfig {
            canvas_size: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(zero.validate(), Err(PipelineError::InvalidConfig(_))));

        let over = PipelineConfig {
            minimum_quality: 1.5,
            ..PipelineConfig::default()
        };
        assert!(matches!(over.validate(), Err(PipelineError::InvalidConfig(_))));

        let nan = PipelineConfig {
            minimum_quality: f64::NAN,
            ..PipelineConfig::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn config_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"canvas_size": 720, "selection": "All"}"#).unwrap();
        assert_eq!(config.canvas_size, 720);
        assert_eq!(config.selection, Selection::All);
        assert!((config.minimum_quality - 0.5).abs() < f64::EPSILON);
    }
}
