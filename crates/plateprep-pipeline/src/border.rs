//! Border color inference from corner pixels.
//!
//! When a scaled image does not fill the square canvas, the padding
//! should blend with the artwork's own background. The guess looks only
//! at the four corners: the most frequent corner value wins, and ties go
//! to the lighter color.
//!
//! Known limitation: the overall tone of the image is not considered, so
//! a dark plate with two light corners still gets a light border.

use image::{ImageBuffer, Pixel};

use crate::raster::{PixelValue, Raster, reference_pixel};

/// Guess a fill color for `image` from its corners.
///
/// Each distinct corner value scores
/// `frequency + 1 / (257 - lightness)`, where lightness is the mean of
/// its channels. The highest score wins; an exact tie keeps the corner
/// seen last in `(0,0), (0,h-1), (w-1,0), (w-1,h-1)` order. An empty
/// image yields the mode's white.
#[must_use]
pub fn guess_border(image: &Raster) -> PixelValue {
    let guess = match image {
        Raster::Bilevel(img) | Raster::Grayscale(img) => guess_border_in(img),
        Raster::Rgb(img) => guess_border_in(img),
        Raster::Rgba(img) | Raster::Cmyk(img) => guess_border_in(img),
    };
    guess.unwrap_or_else(|| reference_pixel(image.mode(), false))
}

/// [`guess_border`] over any 8-bit `image` buffer.
///
/// Returns `None` for an empty buffer.
#[must_use]
pub fn guess_border_in<P: Pixel<Subpixel = u8>>(
    image: &ImageBuffer<P, Vec<u8>>,
) -> Option<PixelValue> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let (right, bottom) = (width - 1, height - 1);
    let corners = [(0, 0), (0, bottom), (right, 0), (right, bottom)]
        .map(|(x, y)| PixelValue::new(image.get_pixel(x, y).channels()));

    // Insertion-ordered vote so ties resolve deterministically.
    let mut votes: Vec<(PixelValue, u32)> = Vec::with_capacity(4);
    for corner in corners {
        match votes.iter_mut().find(|(value, _)| *value == corner) {
            Some((_, count)) => *count += 1,
            None => votes.push((corner, 1)),
        }
    }

    let mut best: Option<(PixelValue, f64)> = None;
    for (value, count) in votes {
        let score = f64::from(count) + 1.0 / (257.0 - value.lightness());
        if best.is_none_or(|(_, top)| score >= top) {
            best = Some((value, score));
        }
    }
    best.map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::*;
    use crate::raster::ColorMode;

    /// A 3x3 image filled with the first corner value, then each corner
    /// set in `(0,0), (2,0), (0,2), (2,2)` order.
    fn corners(mode: ColorMode, values: [bool; 4]) -> Raster {
        const LOCATIONS: [(u32, u32); 4] = [(0, 0), (2, 0), (0, 2), (2, 2)];
        match mode {
            ColorMode::Grayscale => {
                let shade = |white: bool| Luma([if white { 255 } else { 0 }]);
                let mut img = GrayImage::from_pixel(3, 3, shade(values[0]));
                for ((x, y), white) in LOCATIONS.into_iter().zip(values) {
                    img.put_pixel(x, y, shade(white));
                }
                Raster::Grayscale(img)
            }
            _ => {
                let shade = |white: bool| {
                    let v = if white { 255 } else { 0 };
                    Rgb([v, v, v])
                };
                let mut img = RgbImage::from_pixel(3, 3, shade(values[0]));
                for ((x, y), white) in LOCATIONS.into_iter().zip(values) {
                    img.put_pixel(x, y, shade(white));
                }
                Raster::Rgb(img)
            }
        }
    }

    const W: bool = true;
    const B: bool = false;

    #[test]
    fn gray_all_white() {
        let img = corners(ColorMode::Grayscale, [W, W, W, W]);
        assert_eq!(guess_border(&img), PixelValue::gray(255));
    }

    #[test]
    fn gray_all_black() {
        let img = corners(ColorMode::Grayscale, [B, B, B, B]);
        assert_eq!(guess_border(&img), PixelValue::gray(0));
    }

    #[test]
    fn gray_even_split_prefers_lighter() {
        let img = corners(ColorMode::Grayscale, [B, B, W, W]);
        assert_eq!(guess_border(&img), PixelValue::gray(255));
    }

    #[test]
    fn gray_majority_wins() {
        let img = corners(ColorMode::Grayscale, [B, B, B, W]);
        assert_eq!(guess_border(&img), PixelValue::gray(0));
    }

    #[test]
    fn rgb_all_white() {
        let img = corners(ColorMode::Rgb, [W, W, W, W]);
        assert_eq!(guess_border(&img), PixelValue::rgb(255, 255, 255));
    }

    #[test]
    fn rgb_all_black() {
        let img = corners(ColorMode::Rgb, [B, B, B, B]);
        assert_eq!(guess_border(&img), PixelValue::rgb(0, 0, 0));
    }

    #[test]
    fn rgb_even_split_prefers_lighter() {
        let img = corners(ColorMode::Rgb, [B, B, W, W]);
        assert_eq!(guess_border(&img), PixelValue::rgb(255, 255, 255));
    }

    #[test]
    fn rgb_majority_wins() {
        let img = corners(ColorMode::Rgb, [B, B, B, W]);
        assert_eq!(guess_border(&img), PixelValue::rgb(0, 0, 0));
    }

    #[test]
    fn colored_corners_tie_on_lightness() {
        // Two red and two teal corners; teal has the higher channel mean.
        let mut img = RgbImage::from_pixel(4, 4, Rgb([200, 0, 0]));
        img.put_pixel(3, 0, Rgb([0, 160, 160]));
        img.put_pixel(3, 3, Rgb([0, 160, 160]));
        assert_eq!(guess_border(&Raster::Rgb(img)), PixelValue::rgb(0, 160, 160));
    }

    #[test]
    fn single_pixel_image() {
        let img = Raster::Grayscale(GrayImage::from_pixel(1, 1, Luma([77])));
        assert_eq!(guess_border(&img), PixelValue::gray(77));
    }

    #[test]
    fn empty_image_falls_back_to_white() {
        let img = Raster::Rgb(RgbImage::new(0, 0));
        assert_eq!(guess_border(&img), PixelValue::rgb(255, 255, 255));
    }
}
