//! Fixed-shape preprocessing: resize, center crop, normalize, NCHW.

use fishapp_pipeline::PixelBuffer;
use image::RgbImage;
use image::imageops::{self, FilterType};

use crate::error::ClassifyError;
use crate::model::Tensor;

/// Side of the square crop the model sees.
pub const CROP_SIZE: u32 = 224;

/// Shortest-edge length the image is resized to before cropping.
pub const DEFAULT_RESIZE_EDGE: u32 = 256;

/// ImageNet per-channel mean (R, G, B).
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet per-channel standard deviation (R, G, B).
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Build the model input for `buffer`.
///
/// 1. Resize so the shortest edge is `resize_edge` (bilinear, aspect kept)
/// 2. Center-crop to [`CROP_SIZE`] x [`CROP_SIZE`]
/// 3. Scale to `[0, 1]` and normalize with [`MEAN`] / [`STD`]
/// 4. Lay out as `[1, 3, H, W]`
///
/// Steps 1 and 2 run as one: the kept region is located in source pixels
/// by [`crop_window`] and only that region is resampled, so thin strips
/// never produce a huge intermediate image.
///
/// Gray buffers are replicated into three channels first. The buffer
/// itself is never modified.
///
/// # Errors
///
/// Returns [`ClassifyError::InvalidArgument`] if `resize_edge` is smaller
/// than [`CROP_SIZE`].
pub fn preprocess(buffer: &PixelBuffer, resize_edge: u32) -> Result<Tensor, ClassifyError> {
    if resize_edge < CROP_SIZE {
        return Err(ClassifyError::InvalidArgument(format!(
            "resize edge {resize_edge} is smaller than the {CROP_SIZE}px crop"
        )));
    }
    let rgb = buffer.to_rgb();
    let (width, height) = rgb.dimensions();
    let (x, y, cw, ch) = crop_window(width, height, resize_edge);
    let region = imageops::crop_imm(&rgb, x, y, cw, ch).to_image();
    let cropped = imageops::resize(&region, CROP_SIZE, CROP_SIZE, FilterType::Triangle);
    Ok(to_tensor(&cropped))
}

/// The part of a `width` x `height` image that survives resizing its
/// shortest edge to `edge` and center-cropping [`CROP_SIZE`], as
/// `(x, y, width, height)` in source pixels.
///
/// The resized long side is truncated to a whole pixel and the crop
/// offset rounds down. The window is widened to whole source pixels and
/// never empty.
#[must_use]
pub fn crop_window(width: u32, height: u32, edge: u32) -> (u32, u32, u32, u32) {
    let short = width.min(height).max(1);
    let edge = edge.max(CROP_SIZE);
    let (x, cw) = source_span(width.max(1), short, edge);
    let (y, ch) = source_span(height.max(1), short, edge);
    (x, y, cw, ch)
}

/// Start and length along one axis of `len` source pixels.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn source_span(len: u32, short: u32, edge: u32) -> (u32, u32) {
    let resized = u64::from(edge) * u64::from(len) / u64::from(short);
    let kept = resized.min(u64::from(CROP_SIZE));
    let offset = (resized - kept) / 2;
    let per_pixel = f64::from(len) / resized as f64;
    let start = (offset as f64 * per_pixel)
        .floor()
        .clamp(0.0, f64::from(len - 1)) as u32;
    let end = ((offset + kept) as f64 * per_pixel)
        .ceil()
        .clamp(f64::from(start + 1), f64::from(len)) as u32;
    (start, end - start)
}

/// Normalize an RGB image into a `[1, 3, H, W]` tensor.
#[must_use = "returns the tensor"]
pub fn to_tensor(image: &RgbImage) -> Tensor {
    let (w, h) = image.dimensions();
    Tensor::from_shape_fn((1, 3, h as usize, w as usize), |(_, c, y, x)| {
        #[allow(clippy::cast_possible_truncation)]
        let value = image.get_pixel(x as u32, y as u32).0[c];
        (f32::from(value) / 255.0 - MEAN[c]) / STD[c]
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgb;

    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "{a} != {b}");
    }

    #[test]
    fn black_canvas_normalizes_to_negative_mean_over_std() {
        let buf = PixelBuffer::empty(224, 224).unwrap();
        let tensor = preprocess(&buf, DEFAULT_RESIZE_EDGE).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
        for c in 0..3 {
            assert_close(tensor[[0, c, 0, 0]], -MEAN[c] / STD[c]);
            assert_close(tensor[[0, c, 223, 223]], -MEAN[c] / STD[c]);
        }
    }

    #[test]
    fn channels_are_planar_rgb() {
        let img = RgbImage::from_pixel(300, 300, Rgb([255, 0, 0]));
        let tensor = preprocess(&PixelBuffer::from(img), DEFAULT_RESIZE_EDGE).unwrap();
        assert_close(tensor[[0, 0, 100, 100]], (1.0 - MEAN[0]) / STD[0]);
        assert_close(tensor[[0, 1, 100, 100]], -MEAN[1] / STD[1]);
        assert_close(tensor[[0, 2, 100, 100]], -MEAN[2] / STD[2]);
    }

    #[test]
    fn any_shape_becomes_fixed_shape() {
        for (h, w) in [(1, 1), (50, 400), (600, 300), (224, 225)] {
            let tensor = preprocess(&PixelBuffer::empty(h, w).unwrap(), 256).unwrap();
            assert_eq!(tensor.shape(), &[1, 3, 224, 224], "{w}x{h}");
        }
    }

    #[test]
    fn crop_window_maps_back_to_source_pixels() {
        // 448x224 resizes to 512x256; the middle 224 maps to 196 source px.
        assert_eq!(crop_window(448, 224, 256), (126, 14, 196, 196));
        // 100x300 resizes to 256x768.
        assert_eq!(crop_window(100, 300, 256), (6, 106, 88, 88));
        // Already at the crop size: the whole image.
        assert_eq!(crop_window(224, 224, 224), (0, 0, 224, 224));
        // Upscaled images keep at least one source pixel.
        assert_eq!(crop_window(1, 1, 256), (0, 0, 1, 1));
    }

    #[test]
    fn thin_strip_crops_before_resizing() {
        // Resizing first would build a 768000x256 intermediate.
        assert_eq!(crop_window(6000, 2, 256), (2999, 0, 2, 2));
        let strip = RgbImage::from_fn(6000, 2, |x, _| {
            if (2990..3010).contains(&x) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let tensor = preprocess(&PixelBuffer::from(strip), 256).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
        assert_close(tensor[[0, 0, 112, 112]], (1.0 - MEAN[0]) / STD[0]);
    }

    #[test]
    fn crop_takes_the_middle() {
        // White band in the middle third, black elsewhere.
        let img = RgbImage::from_fn(672, 224, |x, _| {
            if (224..448).contains(&x) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let tensor = preprocess(&PixelBuffer::from(img), 256).unwrap();
        let white = (1.0 - MEAN[1]) / STD[1];
        assert_close(tensor[[0, 1, 0, 0]], white);
        assert_close(tensor[[0, 1, 223, 223]], white);
    }

    #[test]
    fn resize_edge_below_crop_rejected() {
        let buf = PixelBuffer::empty(10, 10).unwrap();
        assert!(matches!(
            preprocess(&buf, 200),
            Err(ClassifyError::InvalidArgument(_))
        ));
    }

    #[test]
    fn gray_buffer_is_replicated() {
        let gray = image::GrayImage::from_pixel(256, 256, image::Luma([255]));
        let tensor = preprocess(&PixelBuffer::from(gray), 256).unwrap();
        for c in 0..3 {
            assert_close(tensor[[0, c, 5, 5]], (1.0 - MEAN[c]) / STD[c]);
        }
    }
}
