//! Outlined shapes, text boxes and colour sampling.
//!
//! Every drawing operation mutates the buffer in place. Coordinates that
//! fall outside the canvas are clipped, as a 2-D drawing API would; only
//! structurally malformed input (too few polygon points, a non-positive
//! radius, an empty text region) is rejected, and it is rejected before
//! any pixel is touched.

use std::f64::consts::TAU;

use image::{Luma, Pixel, Rgb};
use imageproc::drawing::{Canvas, draw_hollow_circle_mut, draw_line_segment_mut};

use crate::buffer::{PixelBuffer, Planes};
use crate::types::{Color, PipelineError, Point, Rect};

/// Outline colour for every shape and for text.
pub const STROKE: Color = Color::BLACK;

/// Radius used when a circle is drawn without an explicit radius.
pub const DEFAULT_CIRCLE_RADIUS: i32 = 10;

/// Semi-axes used when an ellipse is drawn without explicit axes.
pub const DEFAULT_ELLIPSE_AXES: (i32, i32) = (150, 75);

/// Rotation used when an ellipse is drawn without an explicit angle.
pub const DEFAULT_ELLIPSE_ANGLE: f64 = 45.0;

/// Ellipse outline thickness in pixels.
pub const ELLIPSE_THICKNESS: i32 = 2;

/// Weight of the white overlay behind a text box.
pub const TEXT_BOX_ALPHA: f64 = 0.5;

/// Distance of the text origin from the text box's lower-left corner.
pub const TEXT_INSET: i32 = 5;

/// Integer magnification applied to the 8x8 glyphs.
pub const GLYPH_SCALE: i64 = 2;

const GLYPH_CELL: i64 = 8;

/// Draw a straight segment between two points.
pub fn line(buffer: &mut PixelBuffer, from: Point, to: Point) {
    stroke(buffer, &Shape::open(&[from, to]));
}

/// Draw the outline of the axis-aligned rectangle with opposite corners
/// `a` and `b` (both inclusive).
pub fn rectangle(buffer: &mut PixelBuffer, a: Point, b: Point) {
    let corners = [
        Point::new(a.x, a.y),
        Point::new(b.x, a.y),
        Point::new(b.x, b.y),
        Point::new(a.x, b.y),
    ];
    stroke(buffer, &Shape::closed(&corners));
}

/// Draw a circle outline.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] if `radius` is not positive
/// or the circle's bounding box does not fit in `i32` coordinates.
pub fn circle(buffer: &mut PixelBuffer, center: Point, radius: i32) -> Result<(), PipelineError> {
    if radius <= 0 {
        return Err(PipelineError::InvalidArgument(format!(
            "circle radius must be positive, got {radius}"
        )));
    }
    let fits = |c: i32| c.checked_add(radius).is_some() && c.checked_sub(radius).is_some();
    if !fits(center.x) || !fits(center.y) {
        return Err(PipelineError::InvalidArgument(format!(
            "circle at ({}, {}) with radius {radius} overflows the coordinate range",
            center.x, center.y
        )));
    }
    stroke(buffer, &Shape::Circle { center, radius });
    Ok(())
}

/// Draw a rotated ellipse outline, [`ELLIPSE_THICKNESS`] pixels wide.
///
/// `axes` are the semi-axis lengths before rotation; `angle` rotates the
/// ellipse clockwise in degrees (image y points down).
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] if either semi-axis is not
/// positive or the angle is not finite.
pub fn ellipse(
    buffer: &mut PixelBuffer,
    center: Point,
    axes: (i32, i32),
    angle: f64,
) -> Result<(), PipelineError> {
    let (a, b) = axes;
    if a <= 0 || b <= 0 {
        return Err(PipelineError::InvalidArgument(format!(
            "ellipse semi-axes must be positive, got ({a}, {b})"
        )));
    }
    if !angle.is_finite() {
        return Err(PipelineError::InvalidArgument(format!(
            "ellipse angle must be finite, got {angle}"
        )));
    }
    for inset in 0..ELLIPSE_THICKNESS {
        let (ra, rb) = (a - inset, b - inset);
        if ra <= 0 || rb <= 0 {
            break;
        }
        stroke(buffer, &Shape::Closed(ellipse_outline(center, ra, rb, angle)));
    }
    Ok(())
}

/// Connect `points` in order and close the outline back to the first.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] if fewer than two points
/// are given.
pub fn polygon(buffer: &mut PixelBuffer, points: &[Point]) -> Result<(), PipelineError> {
    if points.len() < 2 {
        return Err(PipelineError::InvalidArgument(format!(
            "polygon needs at least 2 points, got {}",
            points.len()
        )));
    }
    stroke(buffer, &Shape::closed(points));
    Ok(())
}

/// Overlay a half-transparent white box over `rect` and write `text` in
/// black inside it, starting [`TEXT_INSET`] pixels in from the box's
/// lower-left corner.
///
/// Both the box and the glyphs are clipped to the canvas. Characters
/// outside printable ASCII render as `?`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] if `rect` does not span at
/// least one pixel on each axis.
pub fn text_box(buffer: &mut PixelBuffer, rect: Rect, text: &str) -> Result<(), PipelineError> {
    if !rect.is_proper() {
        return Err(PipelineError::InvalidArgument(format!(
            "text box ({}, {})-({}, {}) is empty",
            rect.x1, rect.y1, rect.x2, rect.y2
        )));
    }
    match buffer.planes_mut() {
        Planes::Gray(img) => {
            lighten_region(img, rect);
            draw_glyphs(img, rect, text, Luma([luma_of(STROKE)]));
        }
        Planes::Rgb(img) => {
            lighten_region(img, rect);
            draw_glyphs(img, rect, text, Rgb([STROKE.r, STROKE.g, STROKE.b]));
        }
    }
    Ok(())
}

/// Sample the colour at `point`, in `(r, g, b)` order.
///
/// # Errors
///
/// Returns [`PipelineError::OutOfBounds`] if `point` is outside the
/// buffer; indices are never wrapped or clamped.
pub fn color_picker(buffer: &PixelBuffer, point: Point) -> Result<Color, PipelineError> {
    buffer.get_point(point)
}

// ---------------------------------------------------------------------------
// Rasterisation
// ---------------------------------------------------------------------------

/// A shape reduced to something imageproc can stroke.
enum Shape {
    Open(Vec<(f64, f64)>),
    Closed(Vec<(f64, f64)>),
    Circle { center: Point, radius: i32 },
}

impl Shape {
    fn open(points: &[Point]) -> Self {
        Self::Open(points.iter().copied().map(to_float).collect())
    }

    fn closed(points: &[Point]) -> Self {
        Self::Closed(points.iter().copied().map(to_float).collect())
    }

    fn draw<C: Canvas>(&self, canvas: &mut C, color: C::Pixel) {
        match self {
            Self::Open(points) => {
                for pair in points.windows(2) {
                    segment(canvas, pair[0], pair[1], color);
                }
            }
            Self::Closed(points) => {
                for pair in points.windows(2) {
                    segment(canvas, pair[0], pair[1], color);
                }
                if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
                    segment(canvas, last, first, color);
                }
            }
            Self::Circle { center, radius } => draw_circle(canvas, *center, *radius, color),
        }
    }
}

fn stroke(buffer: &mut PixelBuffer, shape: &Shape) {
    match buffer.planes_mut() {
        Planes::Gray(img) => shape.draw(img, Luma([luma_of(STROKE)])),
        Planes::Rgb(img) => shape.draw(img, Rgb([STROKE.r, STROKE.g, STROKE.b])),
    }
}

fn to_float(p: Point) -> (f64, f64) {
    (f64::from(p.x), f64::from(p.y))
}

fn luma_of(color: Color) -> u8 {
    crate::grayscale::luma(color.r, color.g, color.b)
}

/// Stroke the part of `from`-`to` that can land on the canvas.
#[allow(clippy::cast_possible_truncation)]
fn segment<C: Canvas>(canvas: &mut C, from: (f64, f64), to: (f64, f64), color: C::Pixel) {
    let (width, height) = canvas.dimensions();
    if let Some((a, b)) = clip_segment(from, to, f64::from(width), f64::from(height)) {
        // Clipped into a window one pixel wider than the canvas.
        draw_line_segment_mut(
            canvas,
            (a.0 as f32, a.1 as f32),
            (b.0 as f32, b.1 as f32),
            color,
        );
    }
}

/// Liang-Barsky clip of a segment to `[-1, width] x [-1, height]`.
///
/// The one-pixel margin keeps endpoint rounding identical to stroking the
/// unclipped segment.
fn clip_segment(
    from: (f64, f64),
    to: (f64, f64),
    width: f64,
    height: f64,
) -> Option<((f64, f64), (f64, f64))> {
    let (x0, y0) = from;
    let (dx, dy) = (to.0 - x0, to.1 - y0);
    let (mut enter, mut leave) = (0.0_f64, 1.0_f64);
    let edges = [
        (-dx, x0 + 1.0),
        (dx, width - x0),
        (-dy, y0 + 1.0),
        (dy, height - y0),
    ];
    for (p, q) in edges {
        if p.abs() < f64::EPSILON {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            enter = enter.max(t);
        } else {
            leave = leave.min(t);
        }
        if enter > leave {
            return None;
        }
    }
    Some((
        (dx.mul_add(enter, x0), dy.mul_add(enter, y0)),
        (dx.mul_add(leave, x0), dy.mul_add(leave, y0)),
    ))
}

/// Stroke a circle, skipping it when it cannot touch the canvas.
///
/// Radii up to the canvas size go through imageproc's midpoint walk.
/// Larger circles are scanned per canvas row and column, so the work
/// depends on the canvas rather than the radius.
fn draw_circle<C: Canvas>(canvas: &mut C, center: Point, radius: i32, color: C::Pixel) {
    let (width, height) = canvas.dimensions();
    let (w, h) = (i64::from(width), i64::from(height));
    let (cx, cy, r) = (i64::from(center.x), i64::from(center.y), i64::from(radius));

    // Bounding box misses the canvas.
    if cx + r < 0 || cy + r < 0 || cx - r >= w || cy - r >= h {
        return;
    }
    // Canvas lies strictly inside the circle.
    let far_x = i128::from(cx.max(w - 1 - cx));
    let far_y = i128::from(cy.max(h - 1 - cy));
    let inner = i128::from(r - 1);
    if far_x * far_x + far_y * far_y < inner * inner {
        return;
    }

    if r <= w.max(h) {
        draw_hollow_circle_mut(canvas, (center.x, center.y), radius, color);
    } else {
        scan_circle(canvas, to_float(center), f64::from(radius), color);
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scan_circle<C: Canvas>(canvas: &mut C, center: (f64, f64), radius: f64, color: C::Pixel) {
    let (width, height) = canvas.dimensions();
    let (cx, cy) = center;
    // Offset along the other axis at distance `d` from the centre.
    let reach = |d: f64| (d.abs() <= radius).then(|| ((radius - d) * (radius + d)).sqrt());

    for x in 0..width {
        if let Some(dy) = reach(f64::from(x) - cx) {
            for y in [cy - dy, cy + dy] {
                let y = y.round();
                if (0.0..f64::from(height)).contains(&y) {
                    canvas.draw_pixel(x, y as u32, color);
                }
            }
        }
    }
    for y in 0..height {
        if let Some(dx) = reach(f64::from(y) - cy) {
            for x in [cx - dx, cx + dx] {
                let x = x.round();
                if (0.0..f64::from(width)).contains(&x) {
                    canvas.draw_pixel(x as u32, y, color);
                }
            }
        }
    }
}

/// Sample a rotated ellipse as a closed polygon.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn ellipse_outline(center: Point, a: i32, b: i32, angle_deg: f64) -> Vec<(f64, f64)> {
    let (a, b) = (f64::from(a), f64::from(b));
    let (sin_r, cos_r) = angle_deg.to_radians().sin_cos();
    // Roughly one vertex every two pixels of perimeter.
    let perimeter = TAU * a.hypot(b) / std::f64::consts::SQRT_2;
    let steps = (perimeter / 2.0).ceil().clamp(36.0, 4096.0) as usize;
    (0..steps)
        .map(|i| {
            let t = TAU * (i as f64) / (steps as f64);
            let (sin_t, cos_t) = t.sin_cos();
            let (ex, ey) = (a * cos_t, b * sin_t);
            let x = f64::from(center.x) + ex.mul_add(cos_r, -ey * sin_r);
            let y = f64::from(center.y) + ex.mul_add(sin_r, ey * cos_r);
            (x, y)
        })
        .collect()
}

/// Blend white over the part of `rect` that lies on the canvas.
fn lighten_region<C>(canvas: &mut C, rect: Rect)
where
    C: Canvas,
    C::Pixel: Pixel<Subpixel = u8>,
{
    let (width, height) = canvas.dimensions();
    let Some((x0, x1)) = clip_span(rect.x1, rect.x2, width) else {
        return;
    };
    let Some((y0, y1)) = clip_span(rect.y1, rect.y2, height) else {
        return;
    };
    for y in y0..y1 {
        for x in x0..x1 {
            let blended = canvas.get_pixel(x, y).map(|v| {
                crate::kernel::saturate_u8(
                    f64::from(v).mul_add(1.0 - TEXT_BOX_ALPHA, 255.0 * TEXT_BOX_ALPHA),
                )
            });
            canvas.draw_pixel(x, y, blended);
        }
    }
}

/// Intersect the half-open span `lo..hi` with `0..len`.
fn clip_span(lo: i32, hi: i32, len: u32) -> Option<(u32, u32)> {
    let lo = u32::try_from(lo.max(0)).ok()?;
    let hi = u32::try_from(hi.max(0)).ok()?.min(len);
    (lo < hi).then_some((lo, hi))
}

/// Render `text` with 8x8 bitmap glyphs scaled by [`GLYPH_SCALE`].
///
/// Positions are computed in `i64`; glyph cells wholly off the canvas are
/// skipped and drawing stops at the right edge.
fn draw_glyphs<C: Canvas>(canvas: &mut C, rect: Rect, text: &str, color: C::Pixel) {
    let (width, height) = canvas.dimensions();
    let (w, h) = (i64::from(width), i64::from(height));
    let cell = GLYPH_CELL * GLYPH_SCALE;
    let top = i64::from(rect.y2) - i64::from(TEXT_INSET) - cell;
    if top >= h || top + cell <= 0 {
        return;
    }

    let mut left = i64::from(rect.x1) + i64::from(TEXT_INSET);
    for ch in text.chars() {
        if left >= w {
            break;
        }
        if left + cell > 0 {
            for (row, bits) in (0..).zip(glyph(ch)) {
                for bit in 0..GLYPH_CELL {
                    if bits & (1 << bit) == 0 {
                        continue;
                    }
                    for sy in 0..GLYPH_SCALE {
                        for sx in 0..GLYPH_SCALE {
                            let x = left + bit * GLYPH_SCALE + sx;
                            let y = top + row * GLYPH_SCALE + sy;
                            if let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y))
                                && x < width
                                && y < height
                            {
                                canvas.draw_pixel(x, y, color);
                            }
                        }
                    }
                }
            }
        }
        left += cell;
    }
}

/// Bitmap rows for `ch`; bit 0 is the leftmost pixel.
fn glyph(ch: char) -> [u8; 8] {
    let code = if ch.is_ascii() && !ch.is_ascii_control() { ch } else { '?' };
    font8x8::legacy::BASIC_LEGACY[code as usize]
}
