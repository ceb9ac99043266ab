//! Shared types for the fishapp buffer operations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// single-plane raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference the
/// colour raster without depending on `image` directly.
pub use image::RgbImage;

/// A 2D integer point in image coordinates.
///
/// Coordinates are signed: annotation shapes may legitimately reach
/// outside the canvas and are clipped when drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: i32,
    /// Vertical position (pixels from top edge).
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned region given by two corners.
///
/// `(x1, y1)` is the top-left corner (inclusive) and `(x2, y2)` the
/// bottom-right corner (exclusive). Whether a rect is acceptable depends
/// on the operation; see [`Rect::within`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    /// Create a new rect from its corner coordinates.
    #[must_use]
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Validate `0 <= x1 < x2 <= width` and `0 <= y1 < y2 <= height`
    /// against `dimensions`, returning `(x, y, width, height)` of the
    /// region in unsigned pixel units.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] if either axis
    /// violates the invariant.
    pub fn within(self, dimensions: Dimensions) -> Result<(u32, u32, u32, u32), PipelineError> {
        let x_ok = 0 <= self.x1
            && self.x1 < self.x2
            && i64::from(self.x2) <= i64::from(dimensions.width);
        let y_ok = 0 <= self.y1
            && self.y1 < self.y2
            && i64::from(self.y2) <= i64::from(dimensions.height);
        if !(x_ok && y_ok) {
            return Err(PipelineError::InvalidArgument(format!(
                "region ({}, {})-({}, {}) is outside the {}x{} image",
                self.x1, self.y1, self.x2, self.y2, dimensions.width, dimensions.height,
            )));
        }
        // Non-negative and ordered, so `unsigned_abs` is exact.
        Ok((
            self.x1.unsigned_abs(),
            self.y1.unsigned_abs(),
            (self.x2 - self.x1).unsigned_abs(),
            (self.y2 - self.y1).unsigned_abs(),
        ))
    }

    /// Returns `true` when the rect spans at least one pixel on each axis.
    #[must_use]
    pub const fn is_proper(self) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2
    }
}

/// An 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Create a new colour.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Channel layout of a [`PixelBuffer`](crate::PixelBuffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channels {
    /// A single luminance plane.
    Gray,
    /// Interleaved red, green, blue.
    Rgb,
}

impl Channels {
    /// Number of bytes per pixel.
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
        }
    }
}

impl TryFrom<u8> for Channels {
    type Error = PipelineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Gray),
            3 => Ok(Self::Rgb),
            other => Err(PipelineError::InvalidArgument(format!(
                "channel count must be 1 or 3, got {other}"
            ))),
        }
    }
}

/// Stable, transport-independent classification of every error the
/// buffer and classification layers can return.
///
/// A transport maps each kind to its own status code without looking at
/// the error's internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad parameter: angle, kernel size, region, point list, or missing image.
    InvalidArgument,
    /// A coordinate lies outside the current buffer.
    OutOfBounds,
    /// Input bytes could not be decoded (or the buffer could not be encoded).
    DecodeError,
    /// Classification requested while the model is not loaded.
    ServiceUnavailable,
    /// The model collaborator failed or returned a mismatched shape.
    InferenceError,
}

impl ErrorKind {
    /// The stable string code for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::OutOfBounds => "out_of_bounds",
            Self::DecodeError => "decode_error",
            Self::ServiceUnavailable => "service_unavailable",
            Self::InferenceError => "inference_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors returned by buffer operations.
///
/// Every operation validates against the current buffer before touching
/// pixel data, so an `Err` always means the buffer is unchanged.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A parameter failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A sampled coordinate lies outside the buffer.
    #[error("point ({x}, {y}) is outside the {width}x{height} image")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Failed to encode the buffer for download.
    #[error("failed to encode image: {0}")]
    ImageEncode(#[source] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The session has no image to operate on.
    #[error("no image uploaded")]
    NoImage,
}

impl PipelineError {
    /// The stable error kind for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) | Self::NoImage => ErrorKind::InvalidArgument,
            Self::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            Self::ImageDecode(_) | Self::ImageEncode(_) | Self::EmptyInput => {
                ErrorKind::DecodeError
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    #[test]
    fn rect_within_accepts_full_image() {
        let region = Rect::new(0, 0, 10, 5).within(dims(10, 5)).unwrap();
        assert_eq!(region, (0, 0, 10, 5));
    }

    #[test]
    fn rect_within_returns_origin_and_size() {
        let region = Rect::new(2, 3, 7, 4).within(dims(10, 10)).unwrap();
        assert_eq!(region, (2, 3, 5, 1));
    }

    #[test]
    fn rect_within_rejects_reversed_and_empty() {
        assert!(Rect::new(5, 0, 5, 4).within(dims(10, 10)).is_err());
        assert!(Rect::new(6, 0, 5, 4).within(dims(10, 10)).is_err());
        assert!(Rect::new(0, 4, 5, 4).within(dims(10, 10)).is_err());
    }

    #[test]
    fn rect_within_rejects_out_of_range() {
        assert!(Rect::new(-1, 0, 5, 4).within(dims(10, 10)).is_err());
        assert!(Rect::new(0, 0, 11, 4).within(dims(10, 10)).is_err());
        assert!(Rect::new(0, 0, 5, 11).within(dims(10, 10)).is_err());
    }

    #[test]
    fn channels_from_count() {
        assert_eq!(Channels::try_from(1).unwrap(), Channels::Gray);
        assert_eq!(Channels::try_from(3).unwrap(), Channels::Rgb);
        assert!(matches!(
            Channels::try_from(4),
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn error_kinds_have_distinct_codes() {
        let kinds = [
            ErrorKind::InvalidArgument,
            ErrorKind::OutOfBounds,
            ErrorKind::DecodeError,
            ErrorKind::ServiceUnavailable,
            ErrorKind::InferenceError,
        ];
        let mut codes: Vec<_> = kinds.iter().map(|k| k.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn error_kind_serializes_as_code() {
        let json = serde_json::to_string(&ErrorKind::OutOfBounds).unwrap();
        assert_eq!(json, "\"out_of_bounds\"");
    }

    #[test]
    fn no_image_is_invalid_argument() {
        assert_eq!(PipelineError::NoImage.kind(), ErrorKind::InvalidArgument);
        assert_eq!(PipelineError::EmptyInput.kind(), ErrorKind::DecodeError);
    }
}
