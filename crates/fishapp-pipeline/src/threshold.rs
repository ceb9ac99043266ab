//! Adaptive local binarization.
//!
//! Each pixel is compared against the Gaussian-weighted mean of its
//! neighbourhood rather than a global cut-off, which keeps text and
//! outlines legible under uneven lighting.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::separable_filter_equal;

use crate::blur::blur_plane;
use crate::buffer::PixelBuffer;
use crate::grayscale::{expand, to_gray_plane};
use crate::kernel::{KernelSize, gaussian_kernel, saturate_u8};

/// Width of the pre-smoothing Gaussian.
pub const PRE_BLUR_SIZE: KernelSize = KernelSize::fixed(5);

/// Width of the square neighbourhood the local mean is taken over.
pub const BLOCK_SIZE: KernelSize = KernelSize::fixed(21);

/// Amount subtracted from the local mean to form the threshold.
pub const OFFSET: u8 = 5;

/// Binarize the buffer: pixels brighter than their local mean minus
/// [`OFFSET`] become white, the rest black.
///
/// The neighbourhood and offset are fixed. The result keeps the buffer's
/// channel count.
#[must_use = "returns the binarized buffer"]
pub fn adaptive_binary(buffer: &PixelBuffer) -> PixelBuffer {
    let gray = to_gray_plane(buffer);
    let smoothed = blur_plane(&gray, PRE_BLUR_SIZE);
    expand(threshold_against_local_mean(&smoothed), buffer.channels())
}

/// Threshold every pixel against the Gaussian-weighted mean of its
/// [`BLOCK_SIZE`] x [`BLOCK_SIZE`] neighbourhood.
///
/// Samples past the border repeat the edge pixel.
#[must_use = "returns the binary plane"]
#[allow(clippy::cast_possible_truncation)]
pub fn threshold_against_local_mean(plane: &GrayImage) -> GrayImage {
    let kernel: Vec<f32> = gaussian_kernel(BLOCK_SIZE)
        .into_iter()
        .map(|w| w as f32)
        .collect();
    // Filtered in f32 so the intermediate pass is not rounded to u8.
    let widened: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(plane.width(), plane.height(), |x, y| {
            Luma([f32::from(plane.get_pixel(x, y).0[0])])
        });
    let mean = separable_filter_equal(&widened, &kernel);

    GrayImage::from_fn(plane.width(), plane.height(), |x, y| {
        let src = i16::from(plane.get_pixel(x, y).0[0]);
        let local = i16::from(saturate_u8(f64::from(mean.get_pixel(x, y).0[0])));
        if src > local - i16::from(OFFSET) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
