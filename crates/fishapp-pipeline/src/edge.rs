//! Gradient-magnitude edge map.
//!
//! grayscale -> Gaussian blur -> first derivatives in x and y ->
//! `sqrt(gx^2 + gy^2)` -> saturate to 8 bits -> expand back to the
//! source channel count.

use image::GrayImage;

use crate::blur::blur_plane;
use crate::buffer::PixelBuffer;
use crate::grayscale::{expand, to_gray_plane};
use crate::kernel::{Border, FloatPlane, KernelSize};
use crate::types::PipelineError;

/// Central-difference derivative taps.
const DERIVATIVE: [f64; 3] = [-1.0, 0.0, 1.0];

/// Pass-through taps for the axis that is not being differentiated.
const IDENTITY: [f64; 1] = [1.0];

/// Gradient-magnitude edge map after a `k`x`k` Gaussian pre-blur.
///
/// The result keeps the original buffer's channel count.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] if `k` is even or not
/// positive; the blur kernel is validated before any work is done.
pub fn sobel(buffer: &PixelBuffer, k: i32) -> Result<PixelBuffer, PipelineError> {
    Ok(sobel_with(buffer, KernelSize::new(k)?))
}

/// [`sobel`] with an already-validated pre-blur size.
#[must_use = "returns the edge map"]
pub fn sobel_with(buffer: &PixelBuffer, size: KernelSize) -> PixelBuffer {
    let gray = to_gray_plane(buffer);
    let blurred = blur_plane(&gray, size);
    expand(gradient_magnitude(&blurred), buffer.channels())
}

/// Per-pixel `sqrt(gx^2 + gy^2)`, saturated to `0..=255`.
#[must_use = "returns the gradient magnitude plane"]
pub fn gradient_magnitude(plane: &GrayImage) -> GrayImage {
    let source = FloatPlane::from_gray(plane);
    let gx = source.convolve_separable(&DERIVATIVE, &IDENTITY, Border::Reflect101);
    let gy = source.convolve_separable(&IDENTITY, &DERIVATIVE, Border::Reflect101);

    let data = gx.data.iter().zip(&gy.data).map(|(x, y)| x.hypot(*y)).collect();
    FloatPlane {
        width: source.width,
        height: source.height,
        data,
    }
    .to_gray()
}
