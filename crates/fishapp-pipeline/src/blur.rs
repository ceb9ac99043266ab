//! Separable Gaussian blur with a caller-chosen odd kernel width.
//!
//! Each channel is blurred independently; Gaussian blur is linear and
//! per-channel, so colour buffers need no special treatment beyond
//! de-interleaving.

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::buffer::{PixelBuffer, Planes};
use crate::kernel::{Border, FloatPlane, KernelSize, gaussian_kernel};
use crate::types::PipelineError;

/// Blur the buffer with a `k`x`k` Gaussian kernel.
///
/// Dimensions and channel count are preserved.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] if `k` is even or not
/// positive. Even kernels have no centre tap and are never silently
/// adjusted.
pub fn gaussian_blur(buffer: &PixelBuffer, k: i32) -> Result<PixelBuffer, PipelineError> {
    Ok(blur_with(buffer, KernelSize::new(k)?))
}

/// Blur the buffer with an already-validated kernel size.
#[must_use = "returns the blurred buffer"]
pub fn blur_with(buffer: &PixelBuffer, size: KernelSize) -> PixelBuffer {
    match buffer.planes() {
        Planes::Gray(img) => blur_plane(img, size).into(),
        Planes::Rgb(img) => blur_rgb(img, size).into(),
    }
}

/// Blur a single 8-bit plane.
#[must_use = "returns the blurred plane"]
pub fn blur_plane(plane: &GrayImage, size: KernelSize) -> GrayImage {
    if size.get() == 1 {
        return plane.clone();
    }
    let kernel = gaussian_kernel(size);
    FloatPlane::from_gray(plane)
        .convolve_separable(&kernel, &kernel, Border::Reflect101)
        .to_gray()
}

/// Blur an RGB image by splitting it into three planes, blurring each,
/// and reassembling.
fn blur_rgb(image: &RgbImage, size: KernelSize) -> RgbImage {
    let (w, h) = image.dimensions();

    let channels: [GrayImage; 3] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| Luma([image.get_pixel(x, y).0[c]]))
    });

    let blurred: [GrayImage; 3] = std::array::from_fn(|c| blur_plane(&channels[c], size));

    RgbImage::from_fn(w, h, |x, y| {
        Rgb([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
        ])
    })
}
