//! Classifier configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::preprocess::{CROP_SIZE, DEFAULT_RESIZE_EDGE};

/// Where to find the model and labels, and how to run them.
///
/// All fields have defaults, so a JSON file only needs the fields it
/// changes. Unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    /// ONNX model file.
    pub model_path: PathBuf,

    /// Label file, one class name per line, in model output order.
    pub labels_path: PathBuf,

    /// Number of ranked labels to return.
    pub top_k: usize,

    /// Shortest-edge length before the center crop. Must be at least 224.
    pub resize_edge: u32,

    /// Give up on inference after this many milliseconds. `None` waits
    /// indefinitely.
    pub inference_timeout_ms: Option<u64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/fish_classifier.onnx"),
            labels_path: PathBuf::from("models/labels.txt"),
            top_k: 3,
            resize_edge: DEFAULT_RESIZE_EDGE,
            inference_timeout_ms: None,
        }
    }
}

impl ClassifierConfig {
    /// Read a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Io`] if the file cannot be read,
    /// [`LoadError::ConfigFormat`] if it is not valid configuration JSON,
    /// or [`LoadError::InvalidConfig`] if a value is out of range.
    pub fn from_json_file(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| LoadError::ConfigFormat {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidConfig`] if `top_k` is zero or
    /// `resize_edge` is smaller than the crop.
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.top_k == 0 {
            return Err(LoadError::InvalidConfig(
                "top_k must be at least 1".to_owned(),
            ));
        }
        if self.resize_edge < CROP_SIZE {
            return Err(LoadError::InvalidConfig(format!(
                "resize_edge must be at least {CROP_SIZE}, got {}",
                self.resize_edge
            )));
        }
        Ok(())
    }

    /// The inference timeout, if one is configured.
    #[must_use]
    pub fn inference_timeout(&self) -> Option<Duration> {
        self.inference_timeout_ms.map(Duration::from_millis)
    }
}
