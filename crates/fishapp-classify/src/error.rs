//! Error types for loading and running the classifier.

use std::path::PathBuf;
use std::time::Duration;

use fishapp_pipeline::ErrorKind;

/// Errors returned by [`Classifier`](crate::Classifier) calls.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// The model or label table never loaded.
    #[error("classifier unavailable: {0}")]
    ServiceUnavailable(String),

    /// A parameter or the input buffer failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The model failed or returned logits that do not match the labels.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The model did not answer in time. The buffer is untouched.
    #[error("inference timed out after {0:?}")]
    Timeout(Duration),
}

impl ClassifyError {
    /// The stable error kind for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Inference(_) | Self::Timeout(_) => ErrorKind::InferenceError,
        }
    }
}

/// Errors from loading configuration, labels or the model.
///
/// A classifier that fails to load stays unavailable rather than
/// propagating this further; see
/// [`Classifier::load_or_unavailable`](crate::Classifier::load_or_unavailable).
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`ClassifierConfig`](crate::ClassifierConfig).
    #[error("invalid config {path}: {source}")]
    ConfigFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The label file contains no labels.
    #[error("label table is empty")]
    EmptyLabels,

    /// The model backend rejected the model file.
    #[error("failed to load model: {0}")]
    Model(String),
}

impl LoadError {
    /// The stable error kind for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::InvalidArgument,
            Self::Io { .. } | Self::ConfigFormat { .. } | Self::EmptyLabels | Self::Model(_) => {
                ErrorKind::ServiceUnavailable
            }
        }
    }
}
