//! Mask application and square-canvas composition.
//!
//! [`Compositor::compose`] runs the per-image decision sequence:
//!
//! 1. apply the mask, if any, over a white base
//! 2. duplicate check against the recall, then record the fingerprint
//! 3. stop here in find-duplicates mode
//! 4. honor keep-existing
//! 5. scale to fit the canvas, padding the short axis with the guessed
//!    border color
//!
//! The duplicate check runs on the masked image before any scaling, so the
//! same artwork at another resolution still collapses.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage, Rgba, RgbaImage};

use crate::border::guess_border_in;
use crate::raster::Raster;
use crate::recall::PerceptualRecall;
use crate::types::{Canvas, CanvasResult, InvariantViolation, Outcome, PipelineConfig};

/// Filter used to scale into the canvas.
pub const CANVAS_FILTER: FilterType = FilterType::CatmullRom;

const WHITE: u8 = u8::MAX;

/// Composite `image` over a white base using `mask` as the stencil.
///
/// Mask luminance selects between image (255) and base (0) per pixel,
/// with linear blending in between. The base is opaque white, or
/// transparent white when `transparent` is set and the image has no
/// alpha of its own; in that case the result's alpha equals the mask.
///
/// # Errors
///
/// Returns [`InvariantViolation::MaskSizeMismatch`] if the two rasters
/// differ in size.
pub fn apply_mask(
    image: &Raster,
    mask: &Raster,
    transparent: bool,
) -> Result<Raster, InvariantViolation> {
    if image.dimensions() != mask.dimensions() {
        return Err(InvariantViolation::MaskSizeMismatch {
            image: image.dimensions(),
            mask: mask.dimensions(),
        });
    }
    let stencil = mask.to_luma();

    let masked = match image {
        Raster::Rgba(rgba) => Raster::Rgba(blend(rgba, &stencil, Rgba([WHITE; 4]))),
        other if transparent => Raster::Rgba(blend(
            &other.to_rgba(),
            &stencil,
            Rgba([WHITE, WHITE, WHITE, 0]),
        )),
        other => Raster::Rgb(blend(&other.to_rgb(), &stencil, Rgb([WHITE; 3]))),
    };
    Ok(masked)
}

fn blend<P>(
    image: &image::ImageBuffer<P, Vec<u8>>,
    stencil: &image::GrayImage,
    base: P,
) -> image::ImageBuffer<P, Vec<u8>>
where
    P: image::Pixel<Subpixel = u8>,
{
    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let weight = u16::from(stencil.get_pixel(x, y).0[0]);
        pixel.apply2(&base, |fg, bg| {
            let mixed = u16::from(fg) * weight + u16::from(bg) * (255 - weight) + 127;
            // mixed / 255 never exceeds 255.
            u8::try_from(mixed / 255).unwrap_or(WHITE)
        });
    }
    out
}

/// Size of `(width, height)` scaled so its longer side is `size`.
///
/// Returns `None` if either side rounds to zero.
#[must_use]
pub fn scaled_dimensions(width: u32, height: u32, size: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }
    let scale = |short: u32, long: u32| {
        let (short, long) = (u64::from(short), u64::from(long));
        let rounded = (short * u64::from(size) * 2 + long) / (2 * long);
        u32::try_from(rounded).ok()
    };
    let (w, h) = if width >= height {
        (size, scale(height, width)?)
    } else {
        (scale(width, height)?, size)
    };
    (w > 0 && h > 0).then_some((w, h))
}

/// Scale `image` into a `size` x `size` canvas, padding with the
/// border color guessed from the scaled image.
///
/// The canvas is RGBA when `transparent` is set (padding alpha 0), RGB
/// otherwise. Returns `None` when scaling degenerates to a zero
/// dimension.
#[must_use]
pub fn fit_to_canvas(image: &Raster, size: u32, transparent: bool) -> Option<Canvas> {
    let (width, height) = image.dimensions();
    let (scaled_w, scaled_h) = scaled_dimensions(width, height, size)?;
    let scaled = if (scaled_w, scaled_h) == (width, height) {
        image.clone()
    } else {
        image.resize_exact(scaled_w, scaled_h, CANVAS_FILTER)
    };

    let offset_x = i64::from((size - scaled_w) / 2);
    let offset_y = i64::from((size - scaled_h) / 2);
    let square = scaled_w == scaled_h;

    let scaled_rgb = scaled.to_rgb();
    let border = guess_border_in(&scaled_rgb).map_or([WHITE; 3], |value| {
        let c = value.channels();
        [c[0], c[1], c[2]]
    });

    let canvas = if transparent {
        let inner = scaled.to_rgba();
        if square {
            Canvas::Rgba(inner)
        } else {
            let [r, g, b] = border;
            let mut canvas = RgbaImage::from_pixel(size, size, Rgba([r, g, b, 0]));
            imageops::replace(&mut canvas, &inner, offset_x, offset_y);
            Canvas::Rgba(canvas)
        }
    } else if square {
        Canvas::Rgb(scaled_rgb)
    } else {
        let mut canvas = RgbImage::from_pixel(size, size, Rgb(border));
        imageops::replace(&mut canvas, &scaled_rgb, offset_x, offset_y);
        Canvas::Rgb(canvas)
    };
    Some(canvas)
}

/// Builds canvases and tracks duplicates for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compositor {
    canvas_size: u32,
    transparent: bool,
    keep_existing: bool,
    find_duplicates: bool,
}

impl Compositor {
    /// A compositor with the given canvas size and all flags off.
    #[must_use]
    pub const fn new(canvas_size: u32) -> Self {
        Self {
            canvas_size,
            transparent: false,
            keep_existing: false,
            find_duplicates: false,
        }
    }

    /// Take size and flags from a pipeline config.
    #[must_use]
    pub const fn from_config(config: &PipelineConfig) -> Self {
        Self {
            canvas_size: config.canvas_size,
            transparent: config.transparent,
            keep_existing: config.keep_existing,
            find_duplicates: config.find_duplicates,
        }
    }

    /// Pad with a transparent border.
    #[must_use]
    pub const fn with_transparency(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    /// Canvas side length.
    #[must_use]
    pub const fn canvas_size(&self) -> u32 {
        self.canvas_size
    }

    /// Produce the canvas for `image`, optionally masked by `mask`.
    ///
    /// `output_exists` reports whether the destination is already on
    /// disk; it only matters with keep-existing. Exactly one fingerprint
    /// is recorded per non-duplicate image.
    ///
    /// # Errors
    ///
    /// Returns an [`InvariantViolation`] if the mask does not match the
    /// image or autocrop misbehaves.
    pub fn compose(
        &self,
        image: &Raster,
        mask: Option<&Raster>,
        recall: &mut PerceptualRecall,
        output_exists: bool,
    ) -> Result<CanvasResult, InvariantViolation> {
        let masked;
        let (subject, produced) = match mask {
            Some(mask) => {
                masked = apply_mask(image, mask, self.transparent)?;
                (&masked, Outcome::Masked)
            }
            None => (image, Outcome::Normal),
        };

        let fingerprint = recall.fingerprint(subject)?;
        if !recall.insert(fingerprint) {
            return Ok(CanvasResult::empty(Outcome::Duplicate));
        }
        if self.find_duplicates {
            return Ok(CanvasResult::empty(produced));
        }
        if self.keep_existing && output_exists {
            return Ok(CanvasResult::empty(Outcome::Skipped));
        }

        Ok(
            match fit_to_canvas(subject, self.canvas_size, self.transparent) {
                Some(canvas) => CanvasResult {
                    outcome: produced,
                    canvas: Some(canvas),
                },
                None => CanvasResult::empty(Outcome::Small),
            },
        )
    }
}
