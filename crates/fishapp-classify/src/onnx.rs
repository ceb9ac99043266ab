//! ONNX Runtime backend for [`Model`].

use std::path::Path;
use std::sync::Mutex;

use ndarray::Ix2;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Value;
use tracing::{debug, info};

use crate::error::LoadError;
use crate::model::{Logits, Model, ModelError, Tensor};

/// Input name used when the model does not declare one.
const DEFAULT_INPUT_NAME: &str = "input";

/// A model file loaded into an ONNX Runtime session.
///
/// The first declared input receives the tensor and the first declared
/// output is read back as logits.
pub struct OnnxModel {
    session: Mutex<Session>,
    input_name: String,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("input_name", &self.input_name)
            .finish_non_exhaustive()
    }
}

impl OnnxModel {
    /// Load and optimize the model at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Io`] if the file does not exist, or
    /// [`LoadError::Model`] if ONNX Runtime rejects it.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        let session = Session::builder()
            .map_err(|e| rejected(path, e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| rejected(path, e))?
            .commit_from_file(path)
            .map_err(|e| rejected(path, e))?;

        let input_name = session
            .inputs
            .first()
            .map_or_else(|| DEFAULT_INPUT_NAME.to_owned(), |input| input.name.clone());
        if session.outputs.is_empty() {
            return Err(LoadError::Model(format!(
                "{} declares no outputs",
                path.display()
            )));
        }

        info!(model = %path.display(), input = %input_name, "loaded onnx model");
        Ok(Self {
            session: Mutex::new(session),
            input_name,
        })
    }
}

fn rejected(path: &Path, e: impl std::fmt::Display) -> LoadError {
    LoadError::Model(format!("{}: {e}", path.display()))
}

impl Model for OnnxModel {
    fn infer(&self, input: &Tensor) -> Result<Logits, ModelError> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError("onnx session lock poisoned".to_owned()))?;

        let value = Value::from_array(input.to_owned())
            .map_err(|e| ModelError(format!("failed to create input tensor: {e}")))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => value])
            .map_err(|e| ModelError(format!("onnx run failed: {e}")))?;

        let view = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| ModelError(format!("failed to extract logits: {e}")))?;
        debug!(shape = ?view.shape(), "onnx output");

        view.to_owned()
            .into_dimensionality::<Ix2>()
            .map_err(|e| ModelError(format!("expected [1, N] logits: {e}")))
    }
}
