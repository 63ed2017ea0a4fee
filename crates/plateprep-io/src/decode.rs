//! Decode image files into [`ImageRecord`]s.
//!
//! Most formats go through the `image` crate. TIFF files are probed with
//! the `tiff` crate first: `image` converts CMYK to RGB on its own,
//! which would skip color management, so 8-bit CMYK TIFFs are read
//! directly together with their embedded ICC profile.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageError, ImageReader};
use plateprep_pipeline::{CmykImage, ImageRecord, Outcome, Raster};
use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder as TiffDecoder, DecodingResult};
use tiff::tags::Tag;
use tiff::{ColorType as TiffColorType, TiffError};

/// TIFF tag holding an embedded ICC profile.
const TIFF_ICC_PROFILE: u16 = 34675;

/// Errors that can occur while decoding one file.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The content is not an image format we can decode.
    #[error("unrecognized image data in {}: {reason}", path.display())]
    Unrecognized {
        /// Source path.
        path: PathBuf,
        /// Codec explanation.
        reason: String,
    },

    /// The file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// Source path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The `image` codec failed on a recognized format.
    #[error("cannot decode {}: {source}", path.display())]
    Image {
        /// Source path.
        path: PathBuf,
        /// Codec error.
        source: ImageError,
    },

    /// The TIFF codec failed on a CMYK file.
    #[error("cannot decode TIFF {}: {source}", path.display())]
    Tiff {
        /// Source path.
        path: PathBuf,
        /// Codec error.
        source: TiffError,
    },
}

impl DecodeError {
    /// Outcome tag for a file that failed to decode.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        match self {
            Self::Unrecognized { .. } => Outcome::Unsupported,
            Self::Io { .. } | Self::Image { .. } | Self::Tiff { .. } => Outcome::Failed,
        }
    }

    fn image(path: &Path, source: ImageError) -> Self {
        match source {
            ImageError::Unsupported(err) => Self::Unrecognized {
                path: path.to_path_buf(),
                reason: err.to_string(),
            },
            ImageError::Decoding(err) => Self::Unrecognized {
                path: path.to_path_buf(),
                reason: err.to_string(),
            },
            ImageError::IoError(source) => Self::Io {
                path: path.to_path_buf(),
                source,
            },
            source => Self::Image {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    fn tiff(path: &Path, source: TiffError) -> Self {
        match source {
            TiffError::FormatError(err) => Self::Unrecognized {
                path: path.to_path_buf(),
                reason: err.to_string(),
            },
            TiffError::UnsupportedError(err) => Self::Unrecognized {
                path: path.to_path_buf(),
                reason: err.to_string(),
            },
            TiffError::IoError(source) => Self::Io {
                path: path.to_path_buf(),
                source,
            },
            source => Self::Tiff {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Decode the file at `path`.
///
/// # Errors
///
/// Returns [`DecodeError::Unrecognized`] for content no codec accepts;
/// other variants for I/O and codec failures.
pub fn decode(path: &Path) -> Result<ImageRecord, DecodeError> {
    if has_tiff_extension(path)
        && let Some(record) = decode_cmyk_tiff(path)?
    {
        return Ok(record);
    }

    let reader = ImageReader::open(path)
        .map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .with_guessed_format()
        .map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| DecodeError::image(path, e))?;

    let bilevel = decoder.original_color_type() == ExtendedColorType::L1;
    // A broken profile block should not reject an otherwise good image.
    let icc_profile = decoder.icc_profile().ok().flatten();
    let image = DynamicImage::from_decoder(decoder).map_err(|e| DecodeError::image(path, e))?;

    let raster = Raster::from_decoded(image, bilevel);
    tracing::debug!(
        path = %path.display(),
        mode = ?raster.mode(),
        width = raster.width(),
        height = raster.height(),
        "decoded"
    );
    Ok(ImageRecord::new(path, raster).with_icc_profile(icc_profile))
}

fn has_tiff_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff"))
}

/// Read an 8-bit CMYK TIFF. Returns `None` for any other color type so
/// the caller can fall back to the generic path.
fn decode_cmyk_tiff(path: &Path) -> Result<Option<ImageRecord>, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut decoder =
        TiffDecoder::new(BufReader::new(file)).map_err(|e| DecodeError::tiff(path, e))?;
    if decoder.colortype().map_err(|e| DecodeError::tiff(path, e))? != TiffColorType::CMYK(8) {
        return Ok(None);
    }

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| DecodeError::tiff(path, e))?;
    let icc_profile = decoder
        .find_tag(Tag::Unknown(TIFF_ICC_PROFILE))
        .ok()
        .flatten()
        .and_then(tag_bytes);
    let samples = match decoder.read_image().map_err(|e| DecodeError::tiff(path, e))? {
        DecodingResult::U8(samples) => samples,
        _ => {
            return Err(DecodeError::Unrecognized {
                path: path.to_path_buf(),
                reason: "CMYK samples are not 8-bit".to_owned(),
            });
        }
    };
    let cmyk = CmykImage::from_raw(width, height, samples).ok_or_else(|| {
        DecodeError::Unrecognized {
            path: path.to_path_buf(),
            reason: format!("CMYK sample count does not match {width}x{height}"),
        }
    })?;

    tracing::debug!(
        path = %path.display(),
        width,
        height,
        embedded_profile = icc_profile.is_some(),
        "decoded CMYK TIFF"
    );
    Ok(Some(
        ImageRecord::new(path, Raster::Cmyk(cmyk)).with_icc_profile(icc_profile),
    ))
}

/// Raw bytes of a tag value.
///
/// Profiles are normally stored as UNDEFINED, but some writers use BYTE,
/// which the decoder hands back as unsigned integers.
fn tag_bytes(value: Value) -> Option<Vec<u8>> {
    match value {
        Value::List(values) => values.into_iter().map(tag_byte).collect(),
        single => tag_byte(single).map(|byte| vec![byte]),
    }
}

fn tag_byte(value: Value) -> Option<u8> {
    match value {
        Value::Byte(byte) => Some(byte),
        Value::Unsigned(v) => u8::try_from(v).ok(),
        Value::UnsignedBig(v) => u8::try_from(v).ok(),
        _ => None,
    }
}
