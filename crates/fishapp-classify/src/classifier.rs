//! Load-once classifier with an explicit unavailable state.

use std::path::Path;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use fishapp_pipeline::PixelBuffer;
use tracing::{debug, info, warn};

use crate::config::ClassifierConfig;
use crate::error::{ClassifyError, LoadError};
use crate::labels::LabelTable;
use crate::model::{Logits, Model, Tensor};
use crate::postprocess::{ClassLabel, rank};
use crate::preprocess::{DEFAULT_RESIZE_EDGE, preprocess};

/// Whether the model and labels are usable.
#[derive(Clone)]
enum State {
    /// Loading failed; every call reports this reason.
    Unloaded { reason: String },
    /// Model and labels loaded and index-aligned.
    Ready {
        model: Arc<dyn Model>,
        labels: Arc<LabelTable>,
    },
}

/// Scores a buffer against a fixed label set.
///
/// Built once at startup. If loading fails the classifier is still
/// constructed, in an unavailable state, so the host keeps running and
/// each call reports [`ClassifyError::ServiceUnavailable`].
///
/// Classification never modifies the buffer it is given.
#[derive(Clone)]
pub struct Classifier {
    state: State,
    resize_edge: u32,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Classifier");
        match &self.state {
            State::Unloaded { reason } => s.field("unloaded", reason),
            State::Ready { labels, .. } => s.field("labels", &labels.len()),
        };
        s.field("resize_edge", &self.resize_edge).finish()
    }
}

impl Classifier {
    /// A ready classifier from already-loaded parts, using the default
    /// resize edge.
    #[must_use]
    pub fn from_parts(model: Arc<dyn Model>, labels: LabelTable) -> Self {
        Self {
            state: State::Ready {
                model,
                labels: Arc::new(labels),
            },
            resize_edge: DEFAULT_RESIZE_EDGE,
        }
    }

    /// A classifier that rejects every call with `reason`.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: State::Unloaded {
                reason: reason.into(),
            },
            resize_edge: DEFAULT_RESIZE_EDGE,
        }
    }

    /// Override the shortest-edge length used before the center crop.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::InvalidArgument`] if `edge` is smaller
    /// than the crop.
    pub fn with_resize_edge(mut self, edge: u32) -> Result<Self, ClassifyError> {
        if edge < crate::preprocess::CROP_SIZE {
            return Err(ClassifyError::InvalidArgument(format!(
                "resize edge {edge} is smaller than the {}px crop",
                crate::preprocess::CROP_SIZE
            )));
        }
        self.resize_edge = edge;
        Ok(self)
    }

    /// Load labels and model as described by `config`.
    ///
    /// # Errors
    ///
    /// Returns the first [`LoadError`]: invalid configuration, unreadable
    /// or empty labels, or a model the backend rejects.
    pub fn try_load(config: &ClassifierConfig) -> Result<Self, LoadError> {
        config.validate()?;
        let labels = LabelTable::from_file(&config.labels_path)?;
        let model = load_model(&config.model_path)?;
        info!(
            model = %config.model_path.display(),
            labels = labels.len(),
            "classifier ready"
        );
        Ok(Self {
            state: State::Ready {
                model,
                labels: Arc::new(labels),
            },
            resize_edge: config.resize_edge,
        })
    }

    /// [`try_load`](Self::try_load), falling back to an unavailable
    /// classifier that remembers why.
    #[must_use]
    pub fn load_or_unavailable(config: &ClassifierConfig) -> Self {
        match Self::try_load(config) {
            Ok(classifier) => classifier,
            Err(e) => {
                warn!(error = %e, "classifier unavailable");
                Self {
                    resize_edge: config.resize_edge,
                    ..Self::unavailable(e.to_string())
                }
            }
        }
    }

    /// Whether calls can succeed.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready { .. })
    }

    /// The label table, once loaded.
    #[must_use]
    pub fn labels(&self) -> Option<&LabelTable> {
        match &self.state {
            State::Ready { labels, .. } => Some(labels.as_ref()),
            State::Unloaded { .. } => None,
        }
    }

    /// The top `top_k` labels for `buffer`, best first.
    ///
    /// # Errors
    ///
    /// - [`ClassifyError::ServiceUnavailable`] if loading failed
    /// - [`ClassifyError::InvalidArgument`] if `top_k` is zero
    /// - [`ClassifyError::Inference`] if the model fails or its output
    ///   does not match the label table
    pub fn classify(
        &self,
        buffer: &PixelBuffer,
        top_k: usize,
    ) -> Result<Vec<ClassLabel>, ClassifyError> {
        let (model, labels, tensor) = self.prepare(buffer, top_k)?;
        let logits = run(model.as_ref(), &tensor)?;
        finish(&logits, &labels, top_k)
    }

    /// [`classify`](Self::classify), giving up after `timeout`.
    ///
    /// Preprocessing happens on the calling thread; only the model call
    /// moves to a worker. A model that overruns is left to finish in the
    /// background and its result is discarded.
    ///
    /// # Errors
    ///
    /// As [`classify`](Self::classify), plus [`ClassifyError::Timeout`].
    pub fn classify_with_timeout(
        &self,
        buffer: &PixelBuffer,
        top_k: usize,
        timeout: Duration,
    ) -> Result<Vec<ClassLabel>, ClassifyError> {
        let (model, labels, tensor) = self.prepare(buffer, top_k)?;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("fishapp-infer".to_owned())
            .spawn(move || {
                // The receiver is gone after a timeout; nothing to report.
                let _ = tx.send(run(model.as_ref(), &tensor));
            })
            .map_err(|e| ClassifyError::Inference(format!("failed to start inference: {e}")))?;

        let logits = match rx.recv_timeout(timeout) {
            Ok(result) => result?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(?timeout, "inference timed out");
                return Err(ClassifyError::Timeout(timeout));
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(ClassifyError::Inference(
                    "inference worker exited without a result".to_owned(),
                ));
            }
        };
        finish(&logits, &labels, top_k)
    }

    /// Readiness and argument checks, then preprocessing.
    fn prepare(
        &self,
        buffer: &PixelBuffer,
        top_k: usize,
    ) -> Result<(Arc<dyn Model>, Arc<LabelTable>, Tensor), ClassifyError> {
        let (model, labels) = match &self.state {
            State::Unloaded { reason } => {
                return Err(ClassifyError::ServiceUnavailable(reason.clone()));
            }
            State::Ready { model, labels } => (Arc::clone(model), Arc::clone(labels)),
        };
        if top_k == 0 {
            return Err(ClassifyError::InvalidArgument(
                "top_k must be at least 1".to_owned(),
            ));
        }
        let tensor = preprocess(buffer, self.resize_edge)?;
        Ok((model, labels, tensor))
    }
}

fn run(model: &dyn Model, tensor: &Tensor) -> Result<Logits, ClassifyError> {
    model
        .infer(tensor)
        .map_err(|e| ClassifyError::Inference(e.to_string()))
}

fn finish(
    logits: &Logits,
    labels: &LabelTable,
    top_k: usize,
) -> Result<Vec<ClassLabel>, ClassifyError> {
    let ranked = rank(logits, labels, top_k)?;
    if let Some(best) = ranked.first() {
        debug!(label = %best.label, score = best.score, "classified");
    }
    Ok(ranked)
}

#[cfg(feature = "onnx")]
fn load_model(path: &Path) -> Result<Arc<dyn Model>, LoadError> {
    Ok(Arc::new(crate::onnx::OnnxModel::load(path)?))
}

#[cfg(not(feature = "onnx"))]
fn load_model(path: &Path) -> Result<Arc<dyn Model>, LoadError> {
    Err(LoadError::Model(format!(
        "{}: built without the `onnx` feature",
        path.display()
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ndarray::Array2;

    use super::*;
    use crate::model::ModelError;

    struct Fixed(Vec<f32>);

    impl Model for Fixed {
        fn infer(&self, input: &Tensor) -> Result<Logits, ModelError> {
            assert_eq!(input.shape(), &[1, 3, 224, 224]);
            Array2::from_shape_vec((1, self.0.len()), self.0.clone())
                .map_err(|e| ModelError(e.to_string()))
        }
    }

    struct Failing;

    impl Model for Failing {
        fn infer(&self, _: &Tensor) -> Result<Logits, ModelError> {
            Err(ModelError("backend exploded".to_owned()))
        }
    }

    struct Slow(Duration);

    impl Model for Slow {
        fn infer(&self, _: &Tensor) -> Result<Logits, ModelError> {
            thread::sleep(self.0);
            Ok(Array2::zeros((1, 1)))
        }
    }

    struct Counting(AtomicUsize);

    impl Model for Counting {
        fn infer(&self, _: &Tensor) -> Result<Logits, ModelError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Array2::zeros((1, 2)))
        }
    }

    fn labels(text: &str) -> LabelTable {
        LabelTable::from_lines(text).unwrap()
    }

    fn black() -> PixelBuffer {
        PixelBuffer::empty(224, 224).unwrap()
    }

    #[test]
    fn unavailable_rejects_calls() {
        let classifier = Classifier::unavailable("no model");
        assert!(!classifier.is_ready());
        let err = classifier.classify(&black(), 3).unwrap_err();
        assert!(matches!(err, ClassifyError::ServiceUnavailable(ref r) if r == "no model"));
        assert_eq!(err.kind().code(), "service_unavailable");
    }

    #[test]
    fn ranks_fixed_logits() {
        let classifier =
            Classifier::from_parts(Arc::new(Fixed(vec![2.0, 1.0, 0.1])), labels("A\nB\nC"));
        let ranked = classifier.classify(&black(), 3).unwrap();
        let names: Vec<_> = ranked.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert!((ranked[0].score - 0.659).abs() < 5e-4);
    }

    #[test]
    fn model_failure_is_inference_error() {
        let classifier = Classifier::from_parts(Arc::new(Failing), labels("A"));
        let err = classifier.classify(&black(), 1).unwrap_err();
        assert!(matches!(err, ClassifyError::Inference(ref m) if m.contains("exploded")));
    }

    #[test]
    fn label_count_mismatch_is_inference_error() {
        let classifier =
            Classifier::from_parts(Arc::new(Fixed(vec![1.0, 2.0])), labels("A\nB\nC"));
        assert!(matches!(
            classifier.classify(&black(), 3),
            Err(ClassifyError::Inference(_))
        ));
    }

    #[test]
    fn zero_top_k_rejected_before_inference() {
        let model = Arc::new(Counting(AtomicUsize::new(0)));
        let classifier = Classifier::from_parts(model.clone(), labels("A\nB"));
        assert!(matches!(
            classifier.classify(&black(), 0),
            Err(ClassifyError::InvalidArgument(_))
        ));
        assert_eq!(model.0.load(Ordering::SeqCst), 0);
        classifier.classify(&black(), 1).unwrap();
        assert_eq!(model.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timeout_leaves_buffer_untouched() {
        let classifier = Classifier::from_parts(
            Arc::new(Slow(Duration::from_millis(500))),
            labels("A"),
        );
        let buffer = black();
        let before = buffer.clone();
        let err = classifier
            .classify_with_timeout(&buffer, 1, Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, ClassifyError::Timeout(_)));
        assert_eq!(err.kind().code(), "inference_error");
        assert_eq!(buffer, before);
    }

    #[test]
    fn fast_model_beats_timeout() {
        let classifier =
            Classifier::from_parts(Arc::new(Fixed(vec![0.0, 3.0])), labels("A\nB"));
        let ranked = classifier
            .classify_with_timeout(&black(), 1, Duration::from_secs(10))
            .unwrap();
        assert_eq!(ranked[0].label, "B");
    }

    #[test]
    fn small_resize_edge_rejected() {
        let classifier = Classifier::from_parts(Arc::new(Fixed(vec![0.0])), labels("A"));
        assert!(classifier.with_resize_edge(100).is_err());
    }

    #[test]
    fn missing_files_leave_classifier_unavailable() {
        let config = ClassifierConfig {
            labels_path: "/nonexistent/labels.txt".into(),
            ..ClassifierConfig::default()
        };
        let classifier = Classifier::load_or_unavailable(&config);
        assert!(!classifier.is_ready());
        assert!(classifier.labels().is_none());
        let err = classifier.classify(&black(), 3).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/labels.txt"));
    }

    #[test]
    fn empty_label_file_leaves_classifier_unavailable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file).unwrap();
        let config = ClassifierConfig {
            labels_path: file.path().to_path_buf(),
            ..ClassifierConfig::default()
        };
        assert!(matches!(
            Classifier::try_load(&config),
            Err(LoadError::EmptyLabels)
        ));
    }
}
