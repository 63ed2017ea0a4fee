//! Run configuration: pipeline settings plus where and how to write.

use std::path::PathBuf;

use plateprep_pipeline::{PipelineConfig, PipelineError};
use serde::{Deserialize, Serialize};

use crate::encode::{EncodeError, OutputFormat, SaveParams};

/// Configuration problems detected before any directory is processed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Pipeline settings are invalid (size, quality, selection flags).
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Transparency was requested for a format without alpha.
    #[error("--transparent is only supported for formats with alpha (png), not {0}")]
    TransparencyUnsupported(OutputFormat),

    /// The output directory does not exist.
    #[error("output directory does not exist: {}", .0.display())]
    MissingOutputDir(PathBuf),

    /// A referenced color profile file does not exist.
    #[error("{kind} color profile file does not exist: {}", path.display())]
    MissingProfile {
        /// `CMYK` or `sRGB`.
        kind: &'static str,
        /// The missing path.
        path: PathBuf,
    },

    /// Save parameters could not be parsed.
    #[error(transparent)]
    SaveParams(#[from] EncodeError),
}

/// Everything one invocation needs besides the input directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Pipeline behavior.
    pub pipeline: PipelineConfig,
    /// Where canvases are written.
    pub output_dir: PathBuf,
    /// Output encoding.
    pub format: OutputFormat,
    /// Encoder tuning.
    pub save_params: SaveParams,
}

impl RunConfig {
    /// Default output directory, relative to the working directory.
    pub const DEFAULT_OUTPUT_DIR: &'static str = "training_images";

    /// Check the combination of settings.
    ///
    /// The output directory must already exist unless the run only looks
    /// for duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        if self.pipeline.transparent && !self.format.supports_alpha() {
            return Err(ConfigError::TransparencyUnsupported(self.format));
        }
        if !self.pipeline.find_duplicates && !self.output_dir.is_dir() {
            return Err(ConfigError::MissingOutputDir(self.output_dir.clone()));
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            output_dir: PathBuf::from(Self::DEFAULT_OUTPUT_DIR),
            format: OutputFormat::default(),
            save_params: SaveParams::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn in_tempdir() -> (tempfile::TempDir, RunConfig) {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            output_dir: dir.path().to_path_buf(),
            ..RunConfig::default()
        };
        (dir, config)
    }

    #[test]
    fn defaults_validate_with_existing_dir() {
        let (_dir, config) = in_tempdir();
        config.validate().unwrap();
        assert_eq!(config.format, OutputFormat::Png);
    }

    #[test]
    fn transparency_requires_png() {
        let (_dir, mut config) = in_tempdir();
        config.pipeline.transparent = true;
        config.validate().unwrap();
        config.format = OutputFormat::Jpeg;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TransparencyUnsupported(OutputFormat::Jpeg))
        ));
    }

    #[test]
    fn missing_output_dir() {
        let config = RunConfig {
            output_dir: PathBuf::from("/nonexistent/training_images"),
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingOutputDir(_))
        ));
    }

    #[test]
    fn find_duplicates_needs_no_output_dir() {
        let mut config = RunConfig {
            output_dir: PathBuf::from("/nonexistent/training_images"),
            ..RunConfig::default()
        };
        config.pipeline.find_duplicates = true;
        config.validate().unwrap();
    }

    #[test]
    fn pipeline_errors_surface() {
        let (_dir, mut config) = in_tempdir();
        config.pipeline.canvas_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Pipeline(_))));
    }
}
