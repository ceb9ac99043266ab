//! Luma conversion.
//!
//! Every filter that works on intensity goes through [`to_gray_plane`]
//! and finishes with [`expand`], so the buffer keeps its channel count
//! across operations: a colour buffer comes back as three identical
//! planes.

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::buffer::{PixelBuffer, Planes};
use crate::kernel::saturate_u8;
use crate::types::Channels;

/// ITU-R BT.601 luma weights for R, G and B.
pub const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Weighted luma of one RGB pixel, rounded to nearest.
#[must_use]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let [wr, wg, wb] = LUMA_WEIGHTS;
    saturate_u8(wr.mul_add(f64::from(r), wg.mul_add(f64::from(g), wb * f64::from(b))))
}

/// Convert the buffer to a single luminance plane.
///
/// Gray buffers are copied unchanged.
#[must_use = "returns the luminance plane"]
pub fn to_gray_plane(buffer: &PixelBuffer) -> GrayImage {
    match buffer.planes() {
        Planes::Gray(img) => img.clone(),
        Planes::Rgb(img) => GrayImage::from_fn(img.width(), img.height(), |x, y| {
            let Rgb([r, g, b]) = *img.get_pixel(x, y);
            Luma([luma(r, g, b)])
        }),
    }
}

/// Wrap a luminance plane in a buffer with the requested channel layout,
/// replicating it into R, G and B for colour layouts.
#[must_use = "returns the expanded buffer"]
pub fn expand(plane: GrayImage, channels: Channels) -> PixelBuffer {
    match channels {
        Channels::Gray => plane.into(),
        Channels::Rgb => RgbImage::from_fn(plane.width(), plane.height(), |x, y| {
            let Luma([v]) = *plane.get_pixel(x, y);
            Rgb([v, v, v])
        })
        .into(),
    }
}

/// Luma-weighted grayscale that keeps the buffer's channel count.
#[must_use = "returns the grayscale buffer"]
pub fn grayscale(buffer: &PixelBuffer) -> PixelBuffer {
    expand(to_gray_plane(buffer), buffer.channels())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Color;

    #[test]
    fn luma_weights_green_highest() {
        let r = luma(255, 0, 0);
        let g = luma(0, 255, 0);
        let b = luma(0, 0, 255);
        assert_eq!((r, g, b), (76, 150, 29));
    }

    #[test]
    fn luma_of_white_and_black() {
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(0, 0, 0), 0);
    }

    #[test]
    fn grayscale_keeps_three_channels() {
        let rgb = RgbImage::from_fn(4, 3, |x, _| Rgb([u8::try_from(x * 60).unwrap(), 10, 200]));
        let buf = PixelBuffer::from(rgb);
        let gray = grayscale(&buf);
        assert_eq!(gray.channels(), Channels::Rgb);
        assert_eq!(gray.dimensions(), buf.dimensions());
        for y in 0..3 {
            for x in 0..4 {
                let Color { r, g, b } = gray.get(x, y).unwrap();
                assert!(r == g && g == b, "pixel ({x},{y}) is not gray");
            }
        }
    }

    #[test]
    fn grayscale_is_idempotent() {
        let rgb = RgbImage::from_fn(5, 5, |x, y| {
            Rgb([u8::try_from(x * 50).unwrap(), u8::try_from(y * 40).unwrap(), 90])
        });
        let once = grayscale(&PixelBuffer::from(rgb));
        let twice = grayscale(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn gray_buffer_passes_through() {
        let plane = GrayImage::from_fn(3, 2, |x, y| Luma([u8::try_from(x + y * 3).unwrap()]));
        let buf = PixelBuffer::from(plane.clone());
        assert_eq!(to_gray_plane(&buf), plane);
        assert_eq!(grayscale(&buf).channels(), Channels::Gray);
    }
}
