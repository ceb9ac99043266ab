//! fishapp-pipeline: In-memory image buffer and the operations on it (sans-IO).
//!
//! A [`Session`] holds one [`PixelBuffer`] and mutates it through named
//! [`Operation`]s:
//!
//! - geometry: rotate, crop, resize, flip, zoom
//! - annotation: line, rectangle, circle, ellipse, polygon, text box,
//!   colour sampling
//! - filters: grayscale, Gaussian blur, gradient-magnitude edges,
//!   adaptive binarization
//!
//! This crate has **no I/O dependencies** -- it decodes and encodes
//! in-memory byte slices only. Files, transports and the classifier
//! live in other crates.

pub mod annotate;
pub mod blur;
pub mod buffer;
pub mod codec;
pub mod edge;
pub mod geometry;
pub mod grayscale;
pub mod kernel;
pub mod session;
pub mod threshold;
pub mod types;

pub use buffer::{MAX_DIMENSION, PixelBuffer, Planes};
pub use geometry::Rotation;
pub use kernel::KernelSize;
pub use session::{Operation, Outcome, Session, SharedSession};
pub use types::{Channels, Color, Dimensions, ErrorKind, PipelineError, Point, Rect};
