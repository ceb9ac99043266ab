//! Rotate, crop, resize, flip and zoom.
//!
//! Rotation, crop, resize and zoom allocate a new [`PixelBuffer`]; the
//! caller commits it. Flips mirror the existing buffer in place since
//! they cannot change its shape.

use std::fmt;

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::buffer::{PixelBuffer, Planes, check_target_size};
use crate::types::{PipelineError, Rect};

/// Scale factor applied by [`zoom_in`].
pub const ZOOM_IN_FACTOR: f64 = 1.2;

/// Scale factor applied by [`zoom_out`].
pub const ZOOM_OUT_FACTOR: f64 = 0.8;

/// A quarter-turn rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    /// 90 degrees clockwise.
    Clockwise90,
    /// Half turn.
    Half,
    /// 90 degrees counter-clockwise (270 clockwise).
    CounterClockwise90,
}

impl Rotation {
    /// The rotation angle in degrees, clockwise.
    #[must_use]
    pub const fn degrees(self) -> i32 {
        match self {
            Self::Clockwise90 => 90,
            Self::Half => 180,
            Self::CounterClockwise90 => 270,
        }
    }
}

impl TryFrom<i32> for Rotation {
    type Error = PipelineError;

    fn try_from(angle: i32) -> Result<Self, Self::Error> {
        match angle {
            90 => Ok(Self::Clockwise90),
            180 => Ok(Self::Half),
            270 => Ok(Self::CounterClockwise90),
            other => Err(PipelineError::InvalidArgument(format!(
                "angle must be 90, 180, or 270, got {other}"
            ))),
        }
    }
}

impl From<Rotation> for i32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

/// Rotate by a quarter-turn multiple given in degrees.
///
/// 90 and 270 swap width and height.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] unless `angle` is 90, 180
/// or 270.
pub fn rotate(buffer: &PixelBuffer, angle: i32) -> Result<PixelBuffer, PipelineError> {
    Ok(rotate_by(buffer, Rotation::try_from(angle)?))
}

/// Rotate by a validated [`Rotation`].
#[must_use = "returns the rotated buffer"]
pub fn rotate_by(buffer: &PixelBuffer, rotation: Rotation) -> PixelBuffer {
    match (buffer.planes(), rotation) {
        (Planes::Gray(img), Rotation::Clockwise90) => imageops::rotate90(img).into(),
        (Planes::Gray(img), Rotation::Half) => imageops::rotate180(img).into(),
        (Planes::Gray(img), Rotation::CounterClockwise90) => imageops::rotate270(img).into(),
        (Planes::Rgb(img), Rotation::Clockwise90) => imageops::rotate90(img).into(),
        (Planes::Rgb(img), Rotation::Half) => imageops::rotate180(img).into(),
        (Planes::Rgb(img), Rotation::CounterClockwise90) => imageops::rotate270(img).into(),
    }
}

/// Copy out the sub-region `rect`.
///
/// The result has dimensions `(x2 - x1, y2 - y1)` and shares no storage
/// with `buffer`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] unless
/// `0 <= x1 < x2 <= width` and `0 <= y1 < y2 <= height`.
pub fn crop(buffer: &PixelBuffer, rect: Rect) -> Result<PixelBuffer, PipelineError> {
    let (x, y, width, height) = rect.within(buffer.dimensions())?;
    Ok(match buffer.planes() {
        Planes::Gray(img) => imageops::crop_imm(img, x, y, width, height).to_image().into(),
        Planes::Rgb(img) => imageops::crop_imm(img, x, y, width, height).to_image().into(),
    })
}

/// Resize to the extent of `rect` using bilinear interpolation.
///
/// Only the span of the rect matters: the target size is
/// `(max(x2 - x1, 1), max(y2 - y1, 1))`, so degenerate or reversed
/// ranges clamp to a single pixel instead of failing.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] if either target side
/// exceeds [`MAX_DIMENSION`](crate::buffer::MAX_DIMENSION).
pub fn resize(buffer: &PixelBuffer, rect: Rect) -> Result<PixelBuffer, PipelineError> {
    let width = span(rect.x1, rect.x2);
    let height = span(rect.y1, rect.y2);
    check_target_size(width, height)?;
    Ok(resample(buffer, width, height, FilterType::Triangle))
}

/// Mirror left-to-right in place.
pub fn flip_horizontal(buffer: &mut PixelBuffer) {
    match buffer.planes_mut() {
        Planes::Gray(img) => imageops::flip_horizontal_in_place(img),
        Planes::Rgb(img) => imageops::flip_horizontal_in_place(img),
    }
}

/// Mirror top-to-bottom in place.
pub fn flip_vertical(buffer: &mut PixelBuffer) {
    match buffer.planes_mut() {
        Planes::Gray(img) => imageops::flip_vertical_in_place(img),
        Planes::Rgb(img) => imageops::flip_vertical_in_place(img),
    }
}

/// Enlarge by [`ZOOM_IN_FACTOR`] with bicubic interpolation.
///
/// Always scales the buffer's current dimensions; repeated calls compound
/// on the actual size, never on an accumulated zoom level.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] once a side would grow past
/// [`MAX_DIMENSION`](crate::buffer::MAX_DIMENSION).
pub fn zoom_in(buffer: &PixelBuffer) -> Result<PixelBuffer, PipelineError> {
    let dims = buffer.dimensions();
    check_target_size(
        scaled(dims.width, ZOOM_IN_FACTOR),
        scaled(dims.height, ZOOM_IN_FACTOR),
    )?;
    Ok(zoom(buffer, ZOOM_IN_FACTOR))
}

/// Shrink by [`ZOOM_OUT_FACTOR`] with bicubic interpolation.
#[must_use = "returns the zoomed buffer"]
pub fn zoom_out(buffer: &PixelBuffer) -> PixelBuffer {
    zoom(buffer, ZOOM_OUT_FACTOR)
}

fn zoom(buffer: &PixelBuffer, factor: f64) -> PixelBuffer {
    let dims = buffer.dimensions();
    resample(
        buffer,
        scaled(dims.width, factor),
        scaled(dims.height, factor),
        FilterType::CatmullRom,
    )
}

fn resample(buffer: &PixelBuffer, width: u32, height: u32, filter: FilterType) -> PixelBuffer {
    match buffer.planes() {
        Planes::Gray(img) => imageops::resize(img, width, height, filter).into(),
        Planes::Rgb(img) => imageops::resize(img, width, height, filter).into(),
    }
}

/// `max(hi - lo, 1)` as an unsigned size.
fn span(lo: i32, hi: i32) -> u32 {
    let extent = i64::from(hi) - i64::from(lo);
    u32::try_from(extent.max(1)).unwrap_or(u32::MAX)
}

/// `round(size * factor)`, never below one pixel.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled(size: u32, factor: f64) -> u32 {
    let target = (f64::from(size) * factor).round();
    // Clamped into the u32 range before the cast.
    target.clamp(1.0, f64::from(u32::MAX)) as u32
}
