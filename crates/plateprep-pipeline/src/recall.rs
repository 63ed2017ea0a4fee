//! Fuzzy recall of images already seen in a run.
//!
//! Each image is reduced to a tiny perceptual fingerprint:
//!
//! 1. crop uniform white margins ([`autocrop`](crate::autocrop::autocrop))
//! 2. convert to grayscale
//! 3. Gaussian blur to suppress re-encoding noise
//! 4. resize to 10x10, ignoring aspect ratio
//! 5. quantize each cell to one of 32 levels
//!
//! Equal fingerprints are treated as duplicates. The test is easy to
//! defeat and will miss some near-duplicates; it only needs to catch
//! simple repetition (the same plate reused at another size or with a
//! different margin) without confusing distinct artwork from the same
//! source.
//!
//! Because the resize ignores aspect ratio, a copy stretched along one
//! axis collapses to the same fingerprint.

use std::collections::HashSet;

use image::imageops::FilterType;

use crate::autocrop::autocrop;
use crate::raster::Raster;
use crate::types::InvariantViolation;

/// Side length of the fingerprint grid.
pub const FINGERPRINT_SIDE: u32 = 10;

/// Number of cells in a fingerprint.
pub const FINGERPRINT_LEN: usize = (FINGERPRINT_SIDE * FINGERPRINT_SIDE) as usize;

/// Number of palette levels each cell is quantized to.
pub const PALETTE_LEVELS: u16 = 32;

/// Blur applied before downsampling.
pub const DEFAULT_BLUR_RADIUS: f32 = 3.0;

/// A 10x10 grid of quantized luminance levels, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Compute the fingerprint of `image` with the default blur.
    ///
    /// # Errors
    ///
    /// Propagates [`InvariantViolation::InvertedCrop`] from autocrop.
    pub fn of(image: &Raster) -> Result<Self, InvariantViolation> {
        Self::with_blur(image, DEFAULT_BLUR_RADIUS)
    }

    /// Compute the fingerprint of `image` with a custom blur radius.
    ///
    /// Non-positive radii skip the blur.
    ///
    /// # Errors
    ///
    /// Propagates [`InvariantViolation::InvertedCrop`] from autocrop.
    pub fn with_blur(image: &Raster, blur_radius: f32) -> Result<Self, InvariantViolation> {
        let cropped = autocrop(image)?;
        let gray = cropped.to_luma();
        let blurred = if blur_radius > 0.0 {
            imageproc::filter::gaussian_blur_f32(&gray, blur_radius)
        } else {
            gray
        };
        let grid = image::imageops::resize(
            &blurred,
            FINGERPRINT_SIDE,
            FINGERPRINT_SIDE,
            FilterType::Lanczos3,
        );

        let mut cells = [0; FINGERPRINT_LEN];
        for (cell, pixel) in cells.iter_mut().zip(grid.pixels()) {
            *cell = quantize(pixel.0[0]);
        }
        Ok(Self(cells))
    }

    /// The quantized cells, row-major.
    #[must_use]
    pub const fn cells(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }
}

/// Map an 8-bit level onto the fixed palette index.
#[allow(clippy::cast_possible_truncation)]
const fn quantize(level: u8) -> u8 {
    (level as u16 * PALETTE_LEVELS / 256) as u8
}

/// The set of fingerprints seen so far, in insertion order.
///
/// One recall normally lives for one directory run. Threading the same
/// instance through several runs deduplicates across them.
#[derive(Debug, Clone)]
pub struct PerceptualRecall {
    blur_radius: f32,
    seen: HashSet<Fingerprint>,
    order: Vec<Fingerprint>,
}

impl Default for PerceptualRecall {
    fn default() -> Self {
        Self::new()
    }
}

impl PerceptualRecall {
    /// An empty recall using [`DEFAULT_BLUR_RADIUS`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_blur_radius(DEFAULT_BLUR_RADIUS)
    }

    /// An empty recall with a custom blur radius.
    #[must_use]
    pub fn with_blur_radius(blur_radius: f32) -> Self {
        Self {
            blur_radius,
            seen: HashSet::new(),
            order: Vec::new(),
        }
    }

    /// Fingerprint `image` with this recall's settings.
    ///
    /// # Errors
    ///
    /// Propagates [`InvariantViolation::InvertedCrop`] from autocrop.
    pub fn fingerprint(&self, image: &Raster) -> Result<Fingerprint, InvariantViolation> {
        Fingerprint::with_blur(image, self.blur_radius)
    }

    /// Whether an image with the same fingerprint has been added.
    ///
    /// # Errors
    ///
    /// Propagates [`InvariantViolation::InvertedCrop`] from autocrop.
    pub fn contains(&self, image: &Raster) -> Result<bool, InvariantViolation> {
        Ok(self.contains_fingerprint(&self.fingerprint(image)?))
    }

    /// Record `image`. Returns `false` if it was already known.
    ///
    /// # Errors
    ///
    /// Propagates [`InvariantViolation::InvertedCrop`] from autocrop.
    pub fn add(&mut self, image: &Raster) -> Result<bool, InvariantViolation> {
        let fingerprint = self.fingerprint(image)?;
        Ok(self.insert(fingerprint))
    }

    /// Whether `fingerprint` has been recorded.
    #[must_use]
    pub fn contains_fingerprint(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains(fingerprint)
    }

    /// Record a precomputed fingerprint. Returns `false` if it was
    /// already known.
    pub fn insert(&mut self, fingerprint: Fingerprint) -> bool {
        if self.seen.insert(fingerprint) {
            self.order.push(fingerprint);
            true
        } else {
            false
        }
    }

    /// Number of distinct fingerprints recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Recorded fingerprints, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Fingerprint> {
        self.order.iter()
    }
}
