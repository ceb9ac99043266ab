//! fishapp-classify: Fixed-shape classification of fishapp buffers.
//!
//! Turns a [`PixelBuffer`](fishapp_pipeline::PixelBuffer) into ranked,
//! labelled probabilities:
//!
//! 1. Resize shortest edge, center-crop to 224x224, normalize, NCHW
//! 2. Score with a [`Model`] (ONNX Runtime behind the `onnx` feature)
//! 3. Softmax, then top-k with ties broken by label index
//!
//! The [`Classifier`] loads once. If the model or labels are missing it
//! stays unavailable and reports so on every call instead of failing
//! the host.

pub mod classifier;
pub mod config;
pub mod error;
pub mod labels;
pub mod model;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod postprocess;
pub mod preprocess;

pub use classifier::Classifier;
pub use config::ClassifierConfig;
pub use error::{ClassifyError, LoadError};
pub use labels::LabelTable;
pub use model::{Logits, Model, ModelError, Tensor};
#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;
pub use postprocess::ClassLabel;
