//! Trim uniform white margins.
//!
//! Scans inward from each edge until a column or row contains a pixel
//! that differs from the mode's white. There is no tolerance: a single
//! off-white pixel (JPEG ringing, scanner noise) stops the scan.

use std::borrow::Cow;

use image::{ImageBuffer, Pixel};

use crate::raster::{Raster, reference_pixel};
use crate::types::InvariantViolation;

/// Half-open pixel rectangle: `left..right` by `top..bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    /// First column kept.
    pub left: u32,
    /// First row kept.
    pub top: u32,
    /// One past the last column kept.
    pub right: u32,
    /// One past the last row kept.
    pub bottom: u32,
}

impl CropRect {
    /// Width of the rectangle (zero if inverted).
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    /// Height of the rectangle (zero if inverted).
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Bounding box of everything that is not white, or `None` if the whole
/// image is white (or empty).
#[must_use]
pub fn content_bounds(image: &Raster) -> Option<CropRect> {
    let white = reference_pixel(image.mode(), false);
    let white = white.channels();
    match image {
        Raster::Bilevel(img) | Raster::Grayscale(img) => content_bounds_in(img, white),
        Raster::Rgb(img) => content_bounds_in(img, white),
        Raster::Rgba(img) | Raster::Cmyk(img) => content_bounds_in(img, white),
    }
}

fn content_bounds_in<P: Pixel<Subpixel = u8>>(
    image: &ImageBuffer<P, Vec<u8>>,
    white: &[u8],
) -> Option<CropRect> {
    let (width, height) = image.dimensions();
    let inked = |x: u32, y: u32| image.get_pixel(x, y).channels() != white;
    let column_inked = |x: u32| (0..height).any(|y| inked(x, y));
    let row_inked = |y: u32| (0..width).any(|x| inked(x, y));

    let left = (0..width).find(|&x| column_inked(x))?;
    let right = (left..width).rev().find(|&x| column_inked(x))? + 1;
    let top = (0..height).find(|&y| row_inked(y))?;
    let bottom = (top..height).rev().find(|&y| row_inked(y))? + 1;

    Some(CropRect {
        left,
        top,
        right,
        bottom,
    })
}

/// Crop `image` to its non-white content.
///
/// An image that is entirely white, or already tight, is returned
/// borrowed and unchanged.
///
/// # Errors
///
/// Returns [`InvariantViolation::InvertedCrop`] if the computed rectangle
/// is empty or exceeds the image; that means the scan above is broken,
/// not that the input is bad.
pub fn autocrop(image: &Raster) -> Result<Cow<'_, Raster>, InvariantViolation> {
    let Some(rect) = content_bounds(image) else {
        return Ok(Cow::Borrowed(image));
    };
    let (width, height) = image.dimensions();
    if rect.left >= rect.right || rect.top >= rect.bottom || rect.right > width || rect.bottom > height
    {
        return Err(InvariantViolation::InvertedCrop {
            width,
            height,
            left: rect.left,
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
        });
    }
    if rect.width() == width && rect.height() == height {
        return Ok(Cow::Borrowed(image));
    }
    Ok(Cow::Owned(image.crop(
        rect.left,
        rect.top,
        rect.width(),
        rect.height(),
    )))
}
