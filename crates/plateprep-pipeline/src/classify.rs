//! Decide whether an image is the mask of the one before it.
//!
//! PDF extraction emits a soft mask as a separate grayscale or bilevel
//! image right after the color plate it belongs to. The test is purely
//! structural:
//!
//! - same width and height
//! - the previous image's mode can carry color
//! - the candidate's mode cannot
//!
//! The color test is on the mode, not the pixels: an RGB image with no
//! saturated pixels still counts as color.
//!
//! Known gaps, kept on purpose: PDF-native mask metadata is not
//! consulted, a grayscale plate followed by a grayscale mask is never
//! paired, and drop-shadow images that precede the real pair are not
//! modeled.

use crate::raster::Raster;

/// Whether `candidate` is the mask for `previous`.
#[must_use]
pub fn masked_by(candidate: &Raster, previous: &Raster) -> bool {
    candidate.dimensions() == previous.dimensions()
        && previous.is_color_capable()
        && !candidate.is_color_capable()
}
