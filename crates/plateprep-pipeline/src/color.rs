//! CMYK to RGB conversion.
//!
//! Color-managed when a source profile is available (embedded in the
//! file, or a caller-supplied default CMYK profile), naive otherwise.
//! The target is the caller's sRGB profile or the built-in sRGB.

use std::fmt;
use std::path::{Path, PathBuf};

use image::RgbImage;
use lcms2::{Intent, PixelFormat, Profile, Transform};

use crate::raster::{CmykImage, Raster, naive_cmyk_to_rgb};
use crate::types::{ImageRecord, InvariantViolation};

/// Loading an ICC profile file failed.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// The file could not be read.
    #[error("cannot read color profile {}: {source}", path.display())]
    Read {
        /// Profile path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not a usable ICC profile.
    #[error("cannot parse color profile {}: {source}", path.display())]
    Parse {
        /// Profile path.
        path: PathBuf,
        /// Error reported by Little CMS.
        source: lcms2::Error,
    },
}

/// How a record was converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// The record was not CMYK.
    Unchanged,
    /// Converted through an ICC transform.
    Profiled,
    /// Converted channel-wise; carries the reason the transform was not used.
    Naive(String),
}

impl Conversion {
    /// Whether the record's pixels changed.
    #[must_use]
    pub const fn converted(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Converts CMYK records to RGB in place.
pub struct ColorNormalizer {
    srgb: Profile,
    default_cmyk: Option<Profile>,
}

impl fmt::Debug for ColorNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorNormalizer")
            .field("default_cmyk", &self.default_cmyk.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for ColorNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorNormalizer {
    /// Built-in sRGB target and no default CMYK profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            srgb: Profile::new_srgb(),
            default_cmyk: None,
        }
    }

    /// Load optional profile files.
    ///
    /// `cmyk` is used for CMYK sources without an embedded profile;
    /// `srgb` replaces the built-in sRGB target.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] if a given file cannot be read or parsed.
    pub fn from_profile_files(
        cmyk: Option<&Path>,
        srgb: Option<&Path>,
    ) -> Result<Self, ProfileError> {
        let srgb = match srgb {
            Some(path) => load_profile(path)?,
            None => Profile::new_srgb(),
        };
        let default_cmyk = cmyk.map(load_profile).transpose()?;
        Ok(Self { srgb, default_cmyk })
    }

    /// Whether a default CMYK profile is configured.
    #[must_use]
    pub const fn has_default_cmyk(&self) -> bool {
        self.default_cmyk.is_some()
    }

    /// Convert `record` to RGB if it is CMYK.
    ///
    /// Profile failures are not errors: the record is converted naively
    /// and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation::MaskColorConversion`] if `record` has
    /// already been consumed as a mask.
    pub fn normalize(&self, record: &mut ImageRecord) -> Result<Conversion, InvariantViolation> {
        if record.is_mask {
            return Err(InvariantViolation::MaskColorConversion {
                path: record.path.clone(),
            });
        }
        let Raster::Cmyk(cmyk) = &record.raster else {
            return Ok(Conversion::Unchanged);
        };

        let (rgb, conversion) = match self.profiled(cmyk, record.icc_profile.as_deref()) {
            Ok(rgb) => (rgb, Conversion::Profiled),
            Err(reason) => {
                tracing::warn!(
                    path = %record.path.display(),
                    %reason,
                    "falling back to naive CMYK conversion"
                );
                (naive_cmyk_to_rgb(cmyk), Conversion::Naive(reason))
            }
        };
        record.raster = Raster::Rgb(rgb);
        // The embedded profile described the CMYK data.
        record.icc_profile = None;
        Ok(conversion)
    }

    fn profiled(&self, cmyk: &CmykImage, embedded: Option<&[u8]>) -> Result<RgbImage, String> {
        let embedded = embedded
            .map(Profile::new_icc)
            .transpose()
            .map_err(|e| format!("embedded profile unusable: {e}"))?;
        let source = embedded
            .as_ref()
            .or(self.default_cmyk.as_ref())
            .ok_or_else(|| "no CMYK profile available".to_owned())?;

        let transform: Transform<[u8; 4], [u8; 3]> = Transform::new(
            source,
            PixelFormat::CMYK_8,
            &self.srgb,
            PixelFormat::RGB_8,
            Intent::Perceptual,
        )
        .map_err(|e| format!("cannot build transform: {e}"))?;

        let input: Vec<[u8; 4]> = cmyk.pixels().map(|p| p.0).collect();
        let mut output = vec![[0_u8; 3]; input.len()];
        transform.transform_pixels(&input, &mut output);

        RgbImage::from_raw(
            cmyk.width(),
            cmyk.height(),
            output.into_iter().flatten().collect(),
        )
        .ok_or_else(|| "transform produced a short buffer".to_owned())
    }
}

fn load_profile(path: &Path) -> Result<Profile, ProfileError> {
    let bytes = std::fs::read(path).map_err(|source| ProfileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Profile::new_icc(&bytes).map_err(|source| ProfileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{GrayImage, Luma, Rgba};

    use super::*;

    fn cmyk_record(value: [u8; 4]) -> ImageRecord {
        ImageRecord::new(
            "plate-000001.tif",
            Raster::Cmyk(CmykImage::from_pixel(4, 3, Rgba(value))),
        )
    }

    #[test]
    fn non_cmyk_is_unchanged() {
        let normalizer = ColorNormalizer::new();
        let mut record = ImageRecord::new(
            "mask.png",
            Raster::Grayscale(GrayImage::from_pixel(2, 2, Luma([9]))),
        );
        assert_eq!(normalizer.normalize(&mut record).unwrap(), Conversion::Unchanged);
        assert_eq!(record.raster.mode(), crate::raster::ColorMode::Grayscale);
    }

    #[test]
    fn cmyk_without_profile_falls_back_to_naive() {
        let normalizer = ColorNormalizer::new();
        let mut record = cmyk_record([0, 255, 255, 0]);
        let conversion = normalizer.normalize(&mut record).unwrap();
        assert!(matches!(conversion, Conversion::Naive(_)));
        assert_eq!(record.raster.mode(), crate::raster::ColorMode::Rgb);
        assert_eq!(record.raster.dimensions(), (4, 3));
        assert_eq!(record.raster.pixel(0, 0).channels(), &[255, 0, 0]);
    }

    #[test]
    fn unparseable_embedded_profile_falls_back_to_naive() {
        let normalizer = ColorNormalizer::new();
        let mut record = cmyk_record([0, 0, 0, 255]).with_icc_profile(Some(vec![1, 2, 3]));
        let conversion = normalizer.normalize(&mut record).unwrap();
        assert!(matches!(conversion, Conversion::Naive(_)));
        assert!(record.icc_profile.is_none());
        assert_eq!(record.raster.pixel(1, 1).channels(), &[0, 0, 0]);
    }

    #[test]
    fn mask_conversion_is_an_invariant_violation() {
        let normalizer = ColorNormalizer::new();
        let mut record = cmyk_record([0, 0, 0, 0]);
        record.is_mask = true;
        let err = normalizer.normalize(&mut record).unwrap_err();
        assert!(matches!(err, InvariantViolation::MaskColorConversion { .. }));
        assert_eq!(record.raster.mode(), crate::raster::ColorMode::Cmyk);
    }

    #[test]
    fn missing_profile_file_is_reported() {
        let err = ColorNormalizer::from_profile_files(
            Some(Path::new("/nonexistent/profile.icc")),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ProfileError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/profile.icc"));
    }

    /// A minimal ICC v2 printer profile: CMYK in, Lab out, through an
    /// 8-bit lookup table. Only black ink matters: none maps to paper
    /// white, full coverage to L* = 0.
    fn black_ink_profile() -> Vec<u8> {
        let mut lut = Vec::new();
        lut.extend_from_slice(b"mft1");
        lut.extend_from_slice(&[0; 4]);
        // Input channels, output channels, grid points, padding.
        lut.extend_from_slice(&[4, 3, 2, 0]);
        for row in 0..3 {
            for col in 0..3 {
                let entry: u32 = if row == col { 0x0001_0000 } else { 0 };
                lut.extend_from_slice(&entry.to_be_bytes());
            }
        }
        for _ in 0..4 {
            lut.extend(0..=u8::MAX);
        }
        // Grid nodes in C, M, Y, K order with K varying fastest.
        for node in 0..16_u8 {
            let lightness = if node & 1 == 1 { 0 } else { 255 };
            lut.extend_from_slice(&[lightness, 128, 128]);
        }
        for _ in 0..3 {
            lut.extend(0..=u8::MAX);
        }

        let tag_offset: u32 = 128 + 4 + 12;
        let size = tag_offset + u32::try_from(lut.len()).unwrap();
        let mut icc = Vec::new();
        icc.extend_from_slice(&size.to_be_bytes());
        icc.extend_from_slice(&[0; 4]);
        icc.extend_from_slice(&[2, 0x10, 0, 0]);
        icc.extend_from_slice(b"prtr");
        icc.extend_from_slice(b"CMYK");
        icc.extend_from_slice(b"Lab ");
        icc.extend_from_slice(&[0; 12]);
        icc.extend_from_slice(b"acsp");
        icc.resize(68, 0);
        // D50 illuminant.
        for component in [0x0000_F6D6_u32, 0x0001_0000, 0x0000_D32D] {
            icc.extend_from_slice(&component.to_be_bytes());
        }
        icc.resize(128, 0);
        icc.extend_from_slice(&1_u32.to_be_bytes());
        icc.extend_from_slice(b"A2B0");
        icc.extend_from_slice(&tag_offset.to_be_bytes());
        icc.extend_from_slice(&u32::try_from(lut.len()).unwrap().to_be_bytes());
        icc.extend_from_slice(&lut);
        icc
    }

    #[test]
    fn embedded_profile_is_used() {
        let normalizer = ColorNormalizer::new();
        let cmyk = CmykImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let mut record = ImageRecord::new("plate-000002.tif", Raster::Cmyk(cmyk))
            .with_icc_profile(Some(black_ink_profile()));

        assert_eq!(normalizer.normalize(&mut record).unwrap(), Conversion::Profiled);
        assert_eq!(record.raster.mode(), crate::raster::ColorMode::Rgb);
        assert!(record.icc_profile.is_none());
        let paper = record.raster.pixel(0, 0);
        let ink = record.raster.pixel(1, 0);
        assert!(paper.channels().iter().all(|&c| c > 240), "{paper:?}");
        assert!(ink.channels().iter().all(|&c| c < 60), "{ink:?}");
    }

    #[test]
    fn default_cmyk_profile_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("press.icc");
        std::fs::write(&path, black_ink_profile()).unwrap();

        let normalizer = ColorNormalizer::from_profile_files(Some(path.as_path()), None).unwrap();
        assert!(normalizer.has_default_cmyk());
        assert!(!ColorNormalizer::new().has_default_cmyk());

        let mut record = cmyk_record([0, 0, 0, 0]);
        assert_eq!(normalizer.normalize(&mut record).unwrap(), Conversion::Profiled);
        assert!(record.raster.pixel(2, 1).channels().iter().all(|&c| c > 240));
    }

    #[test]
    fn broken_embedded_profile_is_not_replaced_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("press.icc");
        std::fs::write(&path, black_ink_profile()).unwrap();
        let normalizer = ColorNormalizer::from_profile_files(Some(path.as_path()), None).unwrap();

        // A broken embedded profile is not silently replaced by the default.
        let mut record = cmyk_record([0, 0, 0, 0]).with_icc_profile(Some(vec![0; 8]));
        assert!(matches!(
            normalizer.normalize(&mut record).unwrap(),
            Conversion::Naive(_)
        ));
    }

    #[test]
    fn unparseable_profile_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.icc");
        std::fs::write(&path, b"not a profile").unwrap();
        let err = ColorNormalizer::from_profile_files(None, Some(path.as_path())).unwrap_err();
        assert!(matches!(err, ProfileError::Parse { .. }));
    }

    #[test]
    fn conversion_reports_change() {
        assert!(!Conversion::Unchanged.converted());
        assert!(Conversion::Profiled.converted());
        assert!(Conversion::Naive(String::new()).converted());
    }
}
