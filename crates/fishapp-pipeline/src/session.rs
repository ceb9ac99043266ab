//! One working image and the operations that change it.
//!
//! A [`Session`] owns at most one [`PixelBuffer`]. Each [`Operation`] is
//! validated against the current buffer before any pixel is written, so a
//! failed [`Session::apply`] leaves the session exactly as it was.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotate;
use crate::blur::blur_with;
use crate::buffer::PixelBuffer;
use crate::codec;
use crate::edge;
use crate::geometry::{self, Rotation};
use crate::grayscale::grayscale;
use crate::kernel::KernelSize;
use crate::threshold::adaptive_binary;
use crate::types::{Color, PipelineError, Point, Rect};

/// A named buffer operation with its parameters.
///
/// Deserialises from `{"op": "rotate", "angle": 90}`-style objects and
/// parses from compact strings such as `rotate=90` or `crop=10,10,50,40`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Rotate {
        angle: Rotation,
    },
    Crop {
        rect: Rect,
    },
    Resize {
        rect: Rect,
    },
    FlipHorizontal,
    FlipVertical,
    ZoomIn,
    ZoomOut,
    Grayscale,
    Blur {
        k: KernelSize,
    },
    Sobel {
        k: KernelSize,
    },
    Binary,
    Line {
        from: Point,
        to: Point,
    },
    Rectangle {
        from: Point,
        to: Point,
    },
    Circle {
        center: Point,
        #[serde(default = "default_circle_radius")]
        radius: i32,
    },
    Ellipse {
        center: Point,
        #[serde(default = "default_ellipse_axes")]
        axes: (i32, i32),
        #[serde(default = "default_ellipse_angle")]
        angle: f64,
    },
    Polygon {
        points: Vec<Point>,
    },
    Text {
        rect: Rect,
        text: String,
    },
    Pick {
        point: Point,
    },
}

const fn default_circle_radius() -> i32 {
    annotate::DEFAULT_CIRCLE_RADIUS
}

const fn default_ellipse_axes() -> (i32, i32) {
    annotate::DEFAULT_ELLIPSE_AXES
}

const fn default_ellipse_angle() -> f64 {
    annotate::DEFAULT_ELLIPSE_ANGLE
}

impl Operation {
    /// The operation's name as used in the string and JSON forms.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Rotate { .. } => "rotate",
            Self::Crop { .. } => "crop",
            Self::Resize { .. } => "resize",
            Self::FlipHorizontal => "flip_horizontal",
            Self::FlipVertical => "flip_vertical",
            Self::ZoomIn => "zoom_in",
            Self::ZoomOut => "zoom_out",
            Self::Grayscale => "grayscale",
            Self::Blur { .. } => "blur",
            Self::Sobel { .. } => "sobel",
            Self::Binary => "binary",
            Self::Line { .. } => "line",
            Self::Rectangle { .. } => "rectangle",
            Self::Circle { .. } => "circle",
            Self::Ellipse { .. } => "ellipse",
            Self::Polygon { .. } => "polygon",
            Self::Text { .. } => "text",
            Self::Pick { .. } => "pick",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses `name` or `name=args`.
///
/// | form | arguments |
/// |------|-----------|
/// | `rotate=A` | 90, 180 or 270 |
/// | `crop=X1,Y1,X2,Y2`, `resize=X1,Y1,X2,Y2` | region corners |
/// | `flip_horizontal`, `flip_vertical`, `zoom_in`, `zoom_out` | none |
/// | `grayscale`, `binary` | none |
/// | `blur=K`, `sobel=K` | odd kernel size |
/// | `line=X1,Y1,X2,Y2`, `rectangle=X1,Y1,X2,Y2` | end points |
/// | `circle=X,Y[,R]` | centre and radius |
/// | `ellipse=X,Y[,A,B[,ANGLE]]` | centre, semi-axes, rotation |
/// | `polygon=X,Y;X,Y;...` | vertices |
/// | `text=X1,Y1,X2,Y2,TEXT` | box corners, then the text (may contain commas) |
/// | `pick=X,Y` | sample point |
impl FromStr for Operation {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, args) = match s.split_once('=') {
            Some((name, args)) => (name.trim(), Some(args)),
            None => (s.trim(), None),
        };

        let op = match (name, args) {
            ("rotate", Some(a)) => Self::Rotate {
                angle: Rotation::try_from(parse_int(a)?)?,
            },
            ("crop", Some(a)) => Self::Crop { rect: parse_rect(a)? },
            ("resize", Some(a)) => Self::Resize { rect: parse_rect(a)? },
            ("flip_horizontal", None) => Self::FlipHorizontal,
            ("flip_vertical", None) => Self::FlipVertical,
            ("zoom_in", None) => Self::ZoomIn,
            ("zoom_out", None) => Self::ZoomOut,
            ("grayscale", None) => Self::Grayscale,
            ("binary", None) => Self::Binary,
            ("blur", Some(a)) => Self::Blur {
                k: KernelSize::new(parse_int(a)?)?,
            },
            ("sobel", Some(a)) => Self::Sobel {
                k: KernelSize::new(parse_int(a)?)?,
            },
            ("line", Some(a)) => {
                let [x1, y1, x2, y2] = parse_ints(a)?;
                Self::Line {
                    from: Point::new(x1, y1),
                    to: Point::new(x2, y2),
                }
            }
            ("rectangle", Some(a)) => {
                let [x1, y1, x2, y2] = parse_ints(a)?;
                Self::Rectangle {
                    from: Point::new(x1, y1),
                    to: Point::new(x2, y2),
                }
            }
            ("circle", Some(a)) => parse_circle(a)?,
            ("ellipse", Some(a)) => parse_ellipse(a)?,
            ("polygon", Some(a)) => Self::Polygon {
                points: a.split(';').map(parse_point).collect::<Result<_, _>>()?,
            },
            ("text", Some(a)) => {
                let mut parts = a.splitn(5, ',');
                let mut corner = || -> Result<i32, PipelineError> {
                    parse_int(parts.next().unwrap_or_default())
                };
                let rect = Rect::new(corner()?, corner()?, corner()?, corner()?);
                Self::Text {
                    rect,
                    text: parts.next().unwrap_or_default().to_owned(),
                }
            }
            ("pick", Some(a)) => Self::Pick { point: parse_point(a)? },
            _ => {
                return Err(PipelineError::InvalidArgument(format!(
                    "unrecognised operation {s:?}"
                )));
            }
        };
        Ok(op)
    }
}

fn parse_int(s: &str) -> Result<i32, PipelineError> {
    let s = s.trim();
    s.parse()
        .map_err(|_| PipelineError::InvalidArgument(format!("expected an integer, got {s:?}")))
}

fn parse_ints<const N: usize>(s: &str) -> Result<[i32; N], PipelineError> {
    let values = s.split(',').map(parse_int).collect::<Result<Vec<_>, _>>()?;
    let count = values.len();
    values.try_into().map_err(|_| {
        PipelineError::InvalidArgument(format!("expected {N} comma-separated values, got {count}"))
    })
}

fn parse_point(s: &str) -> Result<Point, PipelineError> {
    let [x, y] = parse_ints(s)?;
    Ok(Point::new(x, y))
}

fn parse_rect(s: &str) -> Result<Rect, PipelineError> {
    let [x1, y1, x2, y2] = parse_ints(s)?;
    Ok(Rect::new(x1, y1, x2, y2))
}

fn parse_circle(s: &str) -> Result<Operation, PipelineError> {
    let values = s.split(',').map(parse_int).collect::<Result<Vec<_>, _>>()?;
    match values[..] {
        [x, y] => Ok(Operation::Circle {
            center: Point::new(x, y),
            radius: annotate::DEFAULT_CIRCLE_RADIUS,
        }),
        [x, y, radius] => Ok(Operation::Circle {
            center: Point::new(x, y),
            radius,
        }),
        _ => Err(PipelineError::InvalidArgument(format!(
            "circle expects X,Y[,R], got {s:?}"
        ))),
    }
}

fn parse_ellipse(s: &str) -> Result<Operation, PipelineError> {
    let fields = s.split(',').map(str::trim).collect::<Vec<_>>();
    let malformed = || {
        PipelineError::InvalidArgument(format!("ellipse expects X,Y[,A,B[,ANGLE]], got {s:?}"))
    };
    let (center, axes, angle) = match fields[..] {
        [x, y] => (
            Point::new(parse_int(x)?, parse_int(y)?),
            annotate::DEFAULT_ELLIPSE_AXES,
            annotate::DEFAULT_ELLIPSE_ANGLE,
        ),
        [x, y, a, b] => (
            Point::new(parse_int(x)?, parse_int(y)?),
            (parse_int(a)?, parse_int(b)?),
            annotate::DEFAULT_ELLIPSE_ANGLE,
        ),
        [x, y, a, b, angle] => (
            Point::new(parse_int(x)?, parse_int(y)?),
            (parse_int(a)?, parse_int(b)?),
            angle.parse().map_err(|_| malformed())?,
        ),
        _ => return Err(malformed()),
    };
    Ok(Operation::Ellipse {
        center,
        axes,
        angle,
    })
}

/// What a successful [`Session::apply`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The buffer was changed.
    Updated,
    /// A colour was sampled; the buffer is unchanged.
    Color(Color),
}

/// A working image plus the operations on it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    image: Option<PixelBuffer>,
}

impl Session {
    /// A session with no image yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { image: None }
    }

    /// Decode `bytes` and make the result the working image.
    ///
    /// # Errors
    ///
    /// Returns the decode error; the previous image, if any, is kept.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), PipelineError> {
        let buffer = codec::decode(bytes)?;
        debug!(
            width = buffer.width(),
            height = buffer.height(),
            "loaded image"
        );
        self.image = Some(buffer);
        Ok(())
    }

    /// Replace the working image with a black `height` x `width` canvas.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] if either dimension is
    /// zero.
    pub fn new_canvas(&mut self, height: u32, width: u32) -> Result<(), PipelineError> {
        self.image = Some(PixelBuffer::empty(height, width)?);
        debug!(width, height, "created canvas");
        Ok(())
    }

    /// Make an already-built buffer the working image.
    pub fn set_image(&mut self, buffer: PixelBuffer) {
        self.image = Some(buffer);
    }

    /// The working image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoImage`] if nothing has been loaded.
    pub fn image(&self) -> Result<&PixelBuffer, PipelineError> {
        self.image.as_ref().ok_or(PipelineError::NoImage)
    }

    /// Whether a working image is present.
    #[must_use]
    pub const fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Encode the working image as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoImage`] if nothing has been loaded, or
    /// the encoder's error.
    pub fn export_png(&self) -> Result<Vec<u8>, PipelineError> {
        codec::encode_png(self.image()?)
    }

    /// Run `op` against the working image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoImage`] if nothing has been loaded, or
    /// the operation's validation error. The image is unchanged on error.
    pub fn apply(&mut self, op: &Operation) -> Result<Outcome, PipelineError> {
        let current = self.image.as_mut().ok_or(PipelineError::NoImage)?;

        let replacement = match op {
            Operation::Pick { point } => {
                return annotate::color_picker(current, *point).map(Outcome::Color);
            }
            Operation::Rotate { angle } => Some(geometry::rotate_by(current, *angle)),
            Operation::Crop { rect } => Some(geometry::crop(current, *rect)?),
            Operation::Resize { rect } => Some(geometry::resize(current, *rect)?),
            Operation::ZoomIn => Some(geometry::zoom_in(current)?),
            Operation::ZoomOut => Some(geometry::zoom_out(current)),
            Operation::Grayscale => Some(grayscale(current)),
            Operation::Blur { k } => Some(blur_with(current, *k)),
            Operation::Sobel { k } => Some(edge::sobel_with(current, *k)),
            Operation::Binary => Some(adaptive_binary(current)),
            Operation::FlipHorizontal => {
                geometry::flip_horizontal(current);
                None
            }
            Operation::FlipVertical => {
                geometry::flip_vertical(current);
                None
            }
            Operation::Line { from, to } => {
                annotate::line(current, *from, *to);
                None
            }
            Operation::Rectangle { from, to } => {
                annotate::rectangle(current, *from, *to);
                None
            }
            Operation::Circle { center, radius } => {
                annotate::circle(current, *center, *radius)?;
                None
            }
            Operation::Ellipse {
                center,
                axes,
                angle,
            } => {
                annotate::ellipse(current, *center, *axes, *angle)?;
                None
            }
            Operation::Polygon { points } => {
                annotate::polygon(current, points)?;
                None
            }
            Operation::Text { rect, text } => {
                annotate::text_box(current, *rect, text)?;
                None
            }
        };

        if let Some(next) = replacement {
            *current = next;
        }
        debug!(
            op = op.name(),
            width = current.width(),
            height = current.height(),
            "applied operation"
        );
        Ok(Outcome::Updated)
    }
}

/// A [`Session`] shared between threads.
///
/// Callers are serialised on an internal mutex. A panic while the lock
/// is held does not poison the session: later callers get the lock back
/// and see the image as the panicking caller left it. Geometry and filter
/// operations replace the image wholesale, but annotations draw in place,
/// so a panic part-way through one can leave a partly drawn image.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    /// Wrap `session` for shared use.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Run `f` with exclusive access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// [`Session::apply`] under the lock.
    ///
    /// # Errors
    ///
    /// See [`Session::apply`].
    pub fn apply(&self, op: &Operation) -> Result<Outcome, PipelineError> {
        self.with(|session| session.apply(op))
    }
}
