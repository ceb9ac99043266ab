//! The session's working image.
//!
//! [`PixelBuffer`] owns a row-major, interleaved 8-bit raster with either
//! one (gray) or three (RGB) channels. The backing storage is an
//! `image::ImageBuffer`, so the byte length always equals
//! `width * height * channels`; every resize allocates a fresh buffer.
//!
//! Colour buffers are stored in RGB order. [`PixelBuffer::get`] and the
//! colour picker therefore return channels as stored.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

use crate::types::{Channels, Color, Dimensions, PipelineError, Point};

/// Largest width or height an operation may create.
///
/// Decoded uploads are not limited; canvases, resizes and zooms are.
pub const MAX_DIMENSION: u32 = 16_384;

/// The raster planes backing a [`PixelBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Planes {
    /// Single-channel 8-bit luma.
    Gray(GrayImage),
    /// Three-channel 8-bit colour, stored `r, g, b`.
    Rgb(RgbImage),
}

/// A decoded image with bounds-checked access.
///
/// Dimensions are always at least 1x1. Operations either produce a new,
/// validly shaped buffer or fail without touching the existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    planes: Planes,
}

impl PixelBuffer {
    /// Create a black 3-channel canvas of the given size.
    ///
    /// Note the argument order: height first, as in the "new image" dialog.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] if either dimension is
    /// zero or above [`MAX_DIMENSION`].
    pub fn empty(height: u32, width: u32) -> Result<Self, PipelineError> {
        check_target_size(width, height)?;
        Ok(Self {
            planes: Planes::Rgb(RgbImage::new(width, height)),
        })
    }

    /// Build a buffer from raw interleaved bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] if a dimension is zero
    /// or `pixels.len() != width * height * channels`.
    pub fn from_raw(
        width: u32,
        height: u32,
        channels: Channels,
        pixels: Vec<u8>,
    ) -> Result<Self, PipelineError> {
        check_nonzero(width, height)?;
        let len = pixels.len();
        let planes = match channels {
            Channels::Gray => GrayImage::from_raw(width, height, pixels).map(Planes::Gray),
            Channels::Rgb => RgbImage::from_raw(width, height, pixels).map(Planes::Rgb),
        };
        // `from_raw` accepts oversized vectors; the buffer must match exactly.
        let expected = expected_len(width, height, channels);
        match planes {
            Some(planes) if Some(len) == expected => Ok(Self { planes }),
            _ => Err(PipelineError::InvalidArgument(format!(
                "{len} bytes do not form a {width}x{height} image with {} channel(s)",
                channels.count(),
            ))),
        }
    }

    /// Decode an encoded image (PNG, JPEG, BMP, WebP).
    ///
    /// # Errors
    ///
    /// See [`crate::codec::decode`].
    pub fn from_bytes(encoded: &[u8]) -> Result<Self, PipelineError> {
        crate::codec::decode(encoded)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.dimensions().width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.dimensions().height
    }

    /// Width and height.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        let (width, height) = match &self.planes {
            Planes::Gray(img) => img.dimensions(),
            Planes::Rgb(img) => img.dimensions(),
        };
        Dimensions { width, height }
    }

    /// Channel layout.
    #[must_use]
    pub const fn channels(&self) -> Channels {
        match self.planes {
            Planes::Gray(_) => Channels::Gray,
            Planes::Rgb(_) => Channels::Rgb,
        }
    }

    /// The raw interleaved pixel bytes.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        match &self.planes {
            Planes::Gray(img) => img.as_raw(),
            Planes::Rgb(img) => img.as_raw(),
        }
    }

    /// Borrow the backing planes.
    #[must_use]
    pub const fn planes(&self) -> &Planes {
        &self.planes
    }

    /// Mutably borrow the backing planes for in-place drawing.
    pub(crate) const fn planes_mut(&mut self) -> &mut Planes {
        &mut self.planes
    }

    /// Read the colour at `(x, y)`.
    ///
    /// Gray buffers return the luminance replicated across all three
    /// components.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::OutOfBounds`] if `x >= width` or
    /// `y >= height`.
    pub fn get(&self, x: u32, y: u32) -> Result<Color, PipelineError> {
        let Dimensions { width, height } = self.dimensions();
        if x >= width || y >= height {
            return Err(PipelineError::OutOfBounds {
                x: i64::from(x),
                y: i64::from(y),
                width,
                height,
            });
        }
        Ok(match &self.planes {
            Planes::Gray(img) => {
                let Luma([v]) = *img.get_pixel(x, y);
                Color::new(v, v, v)
            }
            Planes::Rgb(img) => {
                let Rgb([r, g, b]) = *img.get_pixel(x, y);
                Color::new(r, g, b)
            }
        })
    }

    /// Read the colour at a signed point; negative coordinates are out
    /// of bounds rather than wrapped.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::OutOfBounds`] for any point outside the
    /// buffer.
    pub fn get_point(&self, point: Point) -> Result<Color, PipelineError> {
        match (u32::try_from(point.x), u32::try_from(point.y)) {
            (Ok(x), Ok(y)) => self.get(x, y),
            _ => {
                let Dimensions { width, height } = self.dimensions();
                Err(PipelineError::OutOfBounds {
                    x: i64::from(point.x),
                    y: i64::from(point.y),
                    width,
                    height,
                })
            }
        }
    }

    /// Atomically swap in a new backing array.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] if the new pixels do not
    /// match the new dimensions; the buffer is left untouched.
    pub fn replace(
        &mut self,
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        channels: Channels,
    ) -> Result<(), PipelineError> {
        *self = Self::from_raw(width, height, channels, pixels)?;
        Ok(())
    }

    /// A copy of the buffer as an `image` crate `DynamicImage`.
    #[must_use]
    pub fn to_dynamic(&self) -> DynamicImage {
        match &self.planes {
            Planes::Gray(img) => DynamicImage::ImageLuma8(img.clone()),
            Planes::Rgb(img) => DynamicImage::ImageRgb8(img.clone()),
        }
    }

    /// A 3-channel copy; gray planes are replicated into R, G and B.
    #[must_use]
    pub fn to_rgb(&self) -> RgbImage {
        match &self.planes {
            Planes::Gray(img) => DynamicImage::ImageLuma8(img.clone()).to_rgb8(),
            Planes::Rgb(img) => img.clone(),
        }
    }

    /// Consume the buffer, returning its planes.
    #[must_use]
    pub fn into_planes(self) -> Planes {
        self.planes
    }
}

impl From<GrayImage> for PixelBuffer {
    fn from(img: GrayImage) -> Self {
        Self {
            planes: Planes::Gray(img),
        }
    }
}

impl From<RgbImage> for PixelBuffer {
    fn from(img: RgbImage) -> Self {
        Self {
            planes: Planes::Rgb(img),
        }
    }
}

/// Convert a decoded image into a buffer.
///
/// Luma8 and Rgb8 are kept as-is; every other colour type is converted to
/// RGB8, dropping alpha.
impl TryFrom<DynamicImage> for PixelBuffer {
    type Error = PipelineError;

    fn try_from(img: DynamicImage) -> Result<Self, Self::Error> {
        check_nonzero(img.width(), img.height())?;
        Ok(match img {
            DynamicImage::ImageLuma8(gray) => gray.into(),
            DynamicImage::ImageRgb8(rgb) => rgb.into(),
            other => other.to_rgb8().into(),
        })
    }
}

fn check_nonzero(width: u32, height: u32) -> Result<(), PipelineError> {
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidArgument(format!(
            "image dimensions must be non-zero, got {width}x{height}"
        )));
    }
    Ok(())
}

/// Validate the size of a buffer about to be allocated.
pub(crate) fn check_target_size(width: u32, height: u32) -> Result<(), PipelineError> {
    check_nonzero(width, height)?;
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(PipelineError::InvalidArgument(format!(
            "{width}x{height} exceeds the {MAX_DIMENSION}px limit per side"
        )));
    }
    Ok(())
}

fn expected_len(width: u32, height: u32, channels: Channels) -> Option<usize> {
    usize::try_from(width)
        .ok()?
        .checked_mul(usize::try_from(height).ok()?)?
        .checked_mul(channels.count())
}
