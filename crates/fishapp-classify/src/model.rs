//! The scoring collaborator.

use ndarray::{Array2, Array4};

/// Normalized NCHW input, shape `[1, 3, 224, 224]`.
pub type Tensor = Array4<f32>;

/// Raw model scores, shape `[1, N]`.
pub type Logits = Array2<f32>;

/// A failure reported by a [`Model`] backend.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ModelError(pub String);

/// Maps a preprocessed tensor to one logit per label.
///
/// Implementations are loaded once and must give the same answer for
/// the same input; the classifier may call them from a worker thread.
pub trait Model: Send + Sync {
    /// Score one batch of one image.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the backend fails.
    fn infer(&self, input: &Tensor) -> Result<Logits, ModelError>;
}
