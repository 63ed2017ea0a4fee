//! Encode canvases to disk.
//!
//! Supports PNG (the only format with alpha), JPEG, BMP and lossless
//! WebP. Format-specific tuning comes from [`SaveParams`], parsed from a
//! `name=value,...` string.

use std::fmt;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{ImageEncoder, ImageError};
use plateprep_pipeline::Canvas;
use serde::{Deserialize, Serialize};

/// Errors that can occur while writing a canvas.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The destination could not be created or written.
    #[error("cannot write {}: {source}", path.display())]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The codec rejected the image.
    #[error("cannot encode {}: {source}", path.display())]
    Image {
        /// Destination path.
        path: PathBuf,
        /// Codec error.
        source: ImageError,
    },

    /// A save parameter is malformed, out of range or not supported by
    /// the encoder.
    #[error("unsupported save parameter {name}={value} for {format}: {reason}")]
    UnsupportedParameter {
        /// Output format.
        format: OutputFormat,
        /// Parameter name.
        name: String,
        /// Parameter value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Output image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG (supports transparency).
    #[default]
    Png,
    /// Baseline JPEG.
    Jpeg,
    /// Windows bitmap.
    Bmp,
    /// Lossless WebP.
    WebP,
}

impl OutputFormat {
    /// Parse a format name or file extension, case-insensitively.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "bmp" => Some(Self::Bmp),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// File extension written for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Bmp => "bmp",
            Self::WebP => "webp",
        }
    }

    /// Whether a transparent border can be stored.
    #[must_use]
    pub const fn supports_alpha(self) -> bool {
        matches!(self, Self::Png)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s)
            .ok_or_else(|| format!("unsupported save format {s:?} (expected png, jpeg, bmp or webp)"))
    }
}

/// Encoder tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaveParams {
    /// JPEG quality, 1-100.
    pub quality: Option<u8>,
    /// PNG zlib level, 0-9.
    pub compress_level: Option<u8>,
    /// Spend more time for a smaller file.
    pub optimize: bool,
}

impl SaveParams {
    /// Default JPEG quality when none is given.
    pub const DEFAULT_JPEG_QUALITY: u8 = 75;

    /// Parse `name=value` pairs separated by commas.
    ///
    /// JPEG accepts `quality` and `optimize`; PNG accepts
    /// `compress_level` and `optimize`. Other names are logged and
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::UnsupportedParameter`] for a pair without
    /// `=`, an unparseable or out-of-range value, or a JPEG option the
    /// encoder cannot honor (`progressive`, `comment`).
    pub fn parse(format: OutputFormat, raw: &str) -> Result<Self, EncodeError> {
        let mut params = Self::default();
        let mut ignored = Vec::new();

        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                unsupported(format, pair, "", "expected name=value")
            })?;
            let (name, value) = (name.trim(), value.trim());
            match (format, name) {
                (OutputFormat::Jpeg, "quality") => {
                    params.quality = Some(parse_ranged(format, name, value, 1, 100)?);
                }
                (OutputFormat::Png, "compress_level") => {
                    params.compress_level = Some(parse_ranged(format, name, value, 0, 9)?);
                }
                (OutputFormat::Jpeg | OutputFormat::Png, "optimize") => {
                    params.optimize = parse_bool(value)
                        .ok_or_else(|| unsupported(format, name, value, "expected a boolean"))?;
                }
                (OutputFormat::Jpeg, "progressive" | "comment") => {
                    return Err(unsupported(
                        format,
                        name,
                        value,
                        "not supported by the JPEG encoder",
                    ));
                }
                _ => ignored.push(name.to_owned()),
            }
        }

        if !ignored.is_empty() {
            ignored.sort();
            tracing::warn!(
                %format,
                parameters = %ignored.join(", "),
                "unrecognized image format parameters"
            );
        }
        Ok(params)
    }
}

fn unsupported(format: OutputFormat, name: &str, value: &str, reason: &str) -> EncodeError {
    EncodeError::UnsupportedParameter {
        format,
        name: name.to_owned(),
        value: value.to_owned(),
        reason: reason.to_owned(),
    }
}

fn parse_ranged(
    format: OutputFormat,
    name: &str,
    value: &str,
    min: u8,
    max: u8,
) -> Result<u8, EncodeError> {
    value
        .parse::<u8>()
        .ok()
        .filter(|v| (min..=max).contains(v))
        .ok_or_else(|| {
            unsupported(
                format,
                name,
                value,
                &format!("expected an integer from {min} to {max}"),
            )
        })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn png_compression(params: &SaveParams) -> CompressionType {
    if params.optimize {
        return CompressionType::Best;
    }
    match params.compress_level {
        Some(0..=3) => CompressionType::Fast,
        Some(7..) => CompressionType::Best,
        Some(_) | None => CompressionType::Default,
    }
}

/// Write `canvas` to `path` in `format`.
///
/// The image is encoded into a temporary file next to `path` and renamed
/// over it only once encoding succeeded, so a failed write never leaves
/// a truncated file at the destination.
///
/// # Errors
///
/// Returns [`EncodeError::Io`] if the file cannot be created, flushed or
/// moved into place, [`EncodeError::Image`] if the codec rejects the
/// pixels (e.g. RGBA to JPEG).
pub fn encode_canvas(
    canvas: &Canvas,
    path: &Path,
    format: OutputFormat,
    params: &SaveParams,
) -> Result<(), EncodeError> {
    let io_err = |source| EncodeError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let staged = tempfile::Builder::new()
        .prefix(".plateprep-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(io_err)?;
    let mut writer = BufWriter::new(staged);

    let (bytes, width, height, color) = match canvas {
        Canvas::Rgb(img) => (img.as_raw(), img.width(), img.height(), image::ExtendedColorType::Rgb8),
        Canvas::Rgba(img) => (img.as_raw(), img.width(), img.height(), image::ExtendedColorType::Rgba8),
    };

    let written = match format {
        OutputFormat::Png => PngEncoder::new_with_quality(
            &mut writer,
            png_compression(params),
            FilterType::Adaptive,
        )
        .write_image(bytes, width, height, color),
        OutputFormat::Jpeg => JpegEncoder::new_with_quality(
            &mut writer,
            params.quality.unwrap_or(SaveParams::DEFAULT_JPEG_QUALITY),
        )
        .write_image(bytes, width, height, color),
        OutputFormat::Bmp => BmpEncoder::new(&mut writer).write_image(bytes, width, height, color),
        OutputFormat::WebP => {
            WebPEncoder::new_lossless(&mut writer).write_image(bytes, width, height, color)
        }
    };
    written.map_err(|source| EncodeError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)?;
    let staged = writer
        .into_inner()
        .map_err(|err| io_err(err.into_error()))?;
    staged.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}
