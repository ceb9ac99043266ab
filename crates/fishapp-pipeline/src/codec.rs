//! Image decoding and encoding at the system boundary.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces a
//! 3-channel [`PixelBuffer`]; encodes a buffer back to PNG for download.
//! Nothing else in the crate touches encoded bytes.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use crate::buffer::{PixelBuffer, Planes};
use crate::types::PipelineError;

/// Media types accepted at upload.
pub const SUPPORTED_MEDIA_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/jpg"];

/// Returns `true` if `media_type` is one of [`SUPPORTED_MEDIA_TYPES`].
#[must_use]
pub fn is_supported_media_type(media_type: &str) -> bool {
    SUPPORTED_MEDIA_TYPES
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(media_type.trim()))
}

/// Decode raw image bytes into a colour buffer.
///
/// Every colour type, including grayscale sources, is decoded to 3-channel
/// RGB so that all uploads start with the same layout.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<PixelBuffer, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    PixelBuffer::try_from(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// Encode the buffer as PNG.
///
/// # Errors
///
/// Returns [`PipelineError::ImageEncode`] if the PNG encoder fails.
pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>, PipelineError> {
    let mut out = Cursor::new(Vec::new());
    let written = match buffer.planes() {
        Planes::Gray(img) => img.write_to(&mut out, ImageFormat::Png),
        Planes::Rgb(img) => img.write_to(&mut out, ImageFormat::Png),
    };
    written.map_err(PipelineError::ImageEncode)?;
    Ok(out.into_inner())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Channels, Color};

    /// Helper: encode an RGBA image as a PNG byte buffer.
    fn encode_rgba(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode(&[]), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn png_decodes_to_rgb_with_dimensions() {
        let img = image::RgbaImage::from_fn(17, 31, |x, _| {
            if x == 0 {
                image::Rgba([200, 100, 50, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        });
        let buf = decode(&encode_rgba(&img)).unwrap();
        assert_eq!(buf.width(), 17);
        assert_eq!(buf.height(), 31);
        assert_eq!(buf.channels(), Channels::Rgb);
        assert_eq!(buf.get(0, 5).unwrap(), Color::new(200, 100, 50));
    }

    #[test]
    fn gray_png_decodes_to_three_channels() {
        let gray = image::GrayImage::from_pixel(3, 3, image::Luma([90]));
        let png = encode_png(&PixelBuffer::from(gray)).unwrap();
        let buf = decode(&png).unwrap();
        assert_eq!(buf.channels(), Channels::Rgb);
        assert_eq!(buf.get(2, 2).unwrap(), Color::new(90, 90, 90));
    }

    #[test]
    fn encode_then_decode_preserves_pixels() {
        let rgb = image::RgbImage::from_fn(4, 3, |x, y| {
            image::Rgb([u8::try_from(x * 40).unwrap(), u8::try_from(y * 60).unwrap(), 7])
        });
        let original = PixelBuffer::from(rgb);
        let restored = decode(&encode_png(&original).unwrap()).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn media_type_filter() {
        assert!(is_supported_media_type("image/png"));
        assert!(is_supported_media_type("image/JPEG"));
        assert!(is_supported_media_type("image/jpg"));
        assert!(!is_supported_media_type("image/gif"));
        assert!(!is_supported_media_type("application/octet-stream"));
    }
}
