//! Color modes and the decoded raster representation.
//!
//! Images extracted from PDFs arrive in one of a small, closed set of
//! color modes. [`Raster`] keeps the pixels in the `image` crate buffer
//! that matches the mode so that mode-level questions ("can this hold
//! color?", "what is white here?") are answered from the enumeration
//! rather than from the pixel data.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Four interleaved ink channels in C, M, Y, K order.
///
/// The `image` crate has no CMYK pixel type, so the four-channel RGBA
/// layout is reused purely as storage. Never hand a `CmykImage` to code
/// that interprets it as RGBA; go through [`naive_cmyk_to_rgb`] or the
/// ICC-aware [`ColorNormalizer`](crate::color::ColorNormalizer).
pub type CmykImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// The closed set of color modes the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ColorMode {
    /// One bit per pixel, stored expanded to 0 / 255.
    Bilevel,
    /// 8-bit luminance.
    Grayscale,
    /// 8-bit red, green, blue.
    Rgb,
    /// 8-bit red, green, blue, alpha.
    Rgba,
    /// 8-bit cyan, magenta, yellow, black ink coverage.
    Cmyk,
}

impl ColorMode {
    /// Number of 8-bit channels per pixel.
    #[must_use]
    pub const fn channels(self) -> usize {
        match self {
            Self::Bilevel | Self::Grayscale => 1,
            Self::Rgb => 3,
            Self::Rgba | Self::Cmyk => 4,
        }
    }

    /// Whether the mode can represent anything beyond gray levels.
    ///
    /// This is a capability check on the mode: an RGB image whose pixels
    /// are all neutral gray is still color-capable.
    #[must_use]
    pub const fn is_color_capable(self) -> bool {
        !matches!(self, Self::Bilevel | Self::Grayscale)
    }
}

/// A single pixel value of up to four 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelValue {
    channels: [u8; 4],
    len: u8,
}

impl PixelValue {
    /// Build a pixel value from a channel slice.
    ///
    /// Channels beyond the fourth are ignored.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(channels: &[u8]) -> Self {
        let len = channels.len().min(4);
        let mut stored = [0; 4];
        stored[..len].copy_from_slice(&channels[..len]);
        Self {
            channels: stored,
            len: len as u8,
        }
    }

    /// A single-channel gray value.
    #[must_use]
    pub const fn gray(value: u8) -> Self {
        Self {
            channels: [value, 0, 0, 0],
            len: 1,
        }
    }

    /// A three-channel RGB value.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            channels: [r, g, b, 0],
            len: 3,
        }
    }

    /// A four-channel value (RGBA or CMYK, depending on context).
    #[must_use]
    pub const fn quad(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self {
            channels: [a, b, c, d],
            len: 4,
        }
    }

    /// The channel values.
    #[must_use]
    pub fn channels(&self) -> &[u8] {
        &self.channels[..usize::from(self.len)]
    }

    /// Mean of the channel values, in `0.0..=255.0`.
    #[must_use]
    pub fn lightness(&self) -> f64 {
        let channels = self.channels();
        if channels.is_empty() {
            return 0.0;
        }
        let sum: u32 = channels.iter().copied().map(u32::from).sum();
        f64::from(sum) / f64::from(self.len)
    }
}

/// The pure-white (or pure-black) pixel for `mode`.
///
/// Bilevel rasters are stored expanded to 0 / 255, so their white is
/// 255 like grayscale. CMYK white is the absence of ink.
#[must_use]
pub const fn reference_pixel(mode: ColorMode, black: bool) -> PixelValue {
    match (mode, black) {
        (ColorMode::Bilevel | ColorMode::Grayscale, false) => PixelValue::gray(255),
        (ColorMode::Bilevel | ColorMode::Grayscale, true) => PixelValue::gray(0),
        (ColorMode::Rgb, false) => PixelValue::rgb(255, 255, 255),
        (ColorMode::Rgb, true) => PixelValue::rgb(0, 0, 0),
        (ColorMode::Rgba, false) => PixelValue::quad(255, 255, 255, 255),
        (ColorMode::Rgba, true) => PixelValue::quad(0, 0, 0, 255),
        (ColorMode::Cmyk, false) => PixelValue::quad(0, 0, 0, 0),
        (ColorMode::Cmyk, true) => PixelValue::quad(0, 0, 0, 255),
    }
}

/// A decoded pixel buffer tagged with its color mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Raster {
    /// Black and white, 0 or 255 per pixel.
    Bilevel(GrayImage),
    /// 8-bit grayscale.
    Grayscale(GrayImage),
    /// 8-bit RGB.
    Rgb(RgbImage),
    /// 8-bit RGBA.
    Rgba(RgbaImage),
    /// 8-bit CMYK (see [`CmykImage`]).
    Cmyk(CmykImage),
}

impl Raster {
    /// Wrap a decoded image, choosing the closest color mode.
    ///
    /// `bilevel` marks sources whose original encoding was one bit per
    /// pixel; the luminance is re-thresholded to exactly 0 / 255. Alpha
    /// on gray sources and 16-bit depth are dropped.
    #[must_use]
    pub fn from_decoded(image: DynamicImage, bilevel: bool) -> Self {
        if bilevel {
            return Self::Bilevel(threshold(image.into_luma8()));
        }
        match image {
            DynamicImage::ImageLuma8(gray) => Self::Grayscale(gray),
            DynamicImage::ImageRgb8(rgb) => Self::Rgb(rgb),
            DynamicImage::ImageRgba8(rgba) => Self::Rgba(rgba),
            other => {
                let color = other.color();
                if !color.has_color() {
                    Self::Grayscale(other.into_luma8())
                } else if color.has_alpha() {
                    Self::Rgba(other.into_rgba8())
                } else {
                    Self::Rgb(other.into_rgb8())
                }
            }
        }
    }

    /// The raster's color mode.
    #[must_use]
    pub const fn mode(&self) -> ColorMode {
        match self {
            Self::Bilevel(_) => ColorMode::Bilevel,
            Self::Grayscale(_) => ColorMode::Grayscale,
            Self::Rgb(_) => ColorMode::Rgb,
            Self::Rgba(_) => ColorMode::Rgba,
            Self::Cmyk(_) => ColorMode::Cmyk,
        }
    }

    /// `(width, height)` in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Bilevel(img) | Self::Grayscale(img) => img.dimensions(),
            Self::Rgb(img) => img.dimensions(),
            Self::Rgba(img) | Self::Cmyk(img) => img.dimensions(),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    /// See [`ColorMode::is_color_capable`].
    #[must_use]
    pub const fn is_color_capable(&self) -> bool {
        self.mode().is_color_capable()
    }

    /// The pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds, like
    /// [`ImageBuffer::get_pixel`].
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> PixelValue {
        match self {
            Self::Bilevel(img) | Self::Grayscale(img) => PixelValue::new(img.get_pixel(x, y).channels()),
            Self::Rgb(img) => PixelValue::new(img.get_pixel(x, y).channels()),
            Self::Rgba(img) | Self::Cmyk(img) => PixelValue::new(img.get_pixel(x, y).channels()),
        }
    }

    /// Copy out the `width` x `height` region whose top-left corner is
    /// `(left, top)`.
    #[must_use]
    pub fn crop(&self, left: u32, top: u32, width: u32, height: u32) -> Self {
        use image::imageops::crop_imm;

        match self {
            Self::Bilevel(img) => Self::Bilevel(crop_imm(img, left, top, width, height).to_image()),
            Self::Grayscale(img) => {
                Self::Grayscale(crop_imm(img, left, top, width, height).to_image())
            }
            Self::Rgb(img) => Self::Rgb(crop_imm(img, left, top, width, height).to_image()),
            Self::Rgba(img) => Self::Rgba(crop_imm(img, left, top, width, height).to_image()),
            Self::Cmyk(img) => Self::Cmyk(crop_imm(img, left, top, width, height).to_image()),
        }
    }

    /// Resize to exactly `width` x `height`, ignoring aspect ratio.
    ///
    /// Bilevel rasters come back as grayscale, since resampling produces
    /// intermediate levels.
    #[must_use]
    pub fn resize_exact(&self, width: u32, height: u32, filter: FilterType) -> Self {
        use image::imageops::resize;

        match self {
            Self::Bilevel(img) | Self::Grayscale(img) => {
                Self::Grayscale(resize(img, width, height, filter))
            }
            Self::Rgb(img) => Self::Rgb(resize(img, width, height, filter)),
            Self::Rgba(img) => Self::Rgba(resize(img, width, height, filter)),
            Self::Cmyk(img) => Self::Cmyk(resize(img, width, height, filter)),
        }
    }

    /// Luminance view of the raster.
    #[must_use]
    pub fn to_luma(&self) -> GrayImage {
        use image::imageops::grayscale;

        match self {
            Self::Bilevel(img) | Self::Grayscale(img) => img.clone(),
            Self::Rgb(img) => grayscale(img),
            Self::Rgba(img) => grayscale(img),
            Self::Cmyk(img) => grayscale(&naive_cmyk_to_rgb(img)),
        }
    }

    /// RGB view of the raster. Alpha is dropped; CMYK uses the naive
    /// channel conversion.
    #[must_use]
    pub fn to_rgb(&self) -> RgbImage {
        match self {
            Self::Bilevel(img) | Self::Grayscale(img) => {
                RgbImage::from_fn(img.width(), img.height(), |x, y| {
                    let Luma([v]) = *img.get_pixel(x, y);
                    Rgb([v, v, v])
                })
            }
            Self::Rgb(img) => img.clone(),
            Self::Rgba(img) => RgbImage::from_fn(img.width(), img.height(), |x, y| {
                let Rgba([r, g, b, _]) = *img.get_pixel(x, y);
                Rgb([r, g, b])
            }),
            Self::Cmyk(img) => naive_cmyk_to_rgb(img),
        }
    }

    /// RGBA view of the raster. Sources without alpha become opaque.
    #[must_use]
    pub fn to_rgba(&self) -> RgbaImage {
        match self {
            Self::Rgba(img) => img.clone(),
            other => {
                let rgb = other.to_rgb();
                RgbaImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                    let Rgb([r, g, b]) = *rgb.get_pixel(x, y);
                    Rgba([r, g, b, 255])
                })
            }
        }
    }
}

/// Convert CMYK to RGB without color management.
///
/// Each color channel is the complement of its ink plus black, clipped:
/// `R = 255 - min(255, C + K)`.
#[must_use]
pub fn naive_cmyk_to_rgb(cmyk: &CmykImage) -> RgbImage {
    RgbImage::from_fn(cmyk.width(), cmyk.height(), |x, y| {
        let Rgba([c, m, ye, k]) = *cmyk.get_pixel(x, y);
        Rgb([
            255 - c.saturating_add(k),
            255 - m.saturating_add(k),
            255 - ye.saturating_add(k),
        ])
    })
}

fn threshold(mut gray: GrayImage) -> GrayImage {
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] >= 128 { 255 } else { 0 };
    }
    gray
}
