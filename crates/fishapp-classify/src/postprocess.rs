//! Softmax and top-k ranking.

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::error::ClassifyError;
use crate::labels::LabelTable;
use crate::model::Logits;

/// Decimal places kept by [`ClassLabel::percentage`].
pub const PERCENT_DECIMALS: i32 = 2;

/// One ranked prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassLabel {
    /// Class name from the label table.
    pub label: String,
    /// Softmax probability in `[0, 1]`.
    pub score: f64,
}

impl ClassLabel {
    /// `score` as a percentage rounded to [`PERCENT_DECIMALS`] places.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        let scale = 10f64.powi(PERCENT_DECIMALS);
        (self.score * 100.0 * scale).round() / scale
    }
}

impl Serialize for ClassLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ClassLabel", 3)?;
        s.serialize_field("label", &self.label)?;
        s.serialize_field("score", &self.score)?;
        s.serialize_field("percentage", &self.percentage())?;
        s.end()
    }
}

/// Numerically stable softmax: the maximum logit is subtracted before
/// exponentiating. Computed in `f64`.
#[must_use]
pub fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits
        .iter()
        .copied()
        .map(f64::from)
        .fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&v| (f64::from(v) - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Indices of the `k` largest probabilities, descending. Equal
/// probabilities keep ascending index order. `k` larger than the input
/// is clamped.
///
/// # Errors
///
/// Returns [`ClassifyError::InvalidArgument`] if `k` is zero.
pub fn top_k(probs: &[f64], k: usize) -> Result<Vec<usize>, ClassifyError> {
    if k == 0 {
        return Err(ClassifyError::InvalidArgument(
            "top_k must be at least 1".to_owned(),
        ));
    }
    let mut order: Vec<usize> = (0..probs.len()).collect();
    // Stable sort, so ties stay in index order.
    order.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));
    order.truncate(k);
    Ok(order)
}

/// Turn raw `[1, N]` logits into the top `k` labelled probabilities.
///
/// # Errors
///
/// Returns [`ClassifyError::Inference`] if the logits are not shaped
/// `[1, labels.len()]` or contain non-finite values, and
/// [`ClassifyError::InvalidArgument`] if `k` is zero.
pub fn rank(
    logits: &Logits,
    labels: &LabelTable,
    k: usize,
) -> Result<Vec<ClassLabel>, ClassifyError> {
    if logits.shape() != [1, labels.len()] {
        return Err(ClassifyError::Inference(format!(
            "model returned logits of shape {:?}, expected [1, {}]",
            logits.shape(),
            labels.len()
        )));
    }
    let row: Vec<f32> = logits.iter().copied().collect();
    if row.iter().any(|v| !v.is_finite()) {
        return Err(ClassifyError::Inference(
            "model returned non-finite logits".to_owned(),
        ));
    }

    let probs = softmax(&row);
    let ranked = top_k(&probs, k)?
        .into_iter()
        .filter_map(|i| {
            labels.get(i).map(|label| ClassLabel {
                label: label.to_owned(),
                score: probs[i],
            })
        })
        .collect();
    Ok(ranked)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ndarray::Array2;

    use super::*;

    fn labels(names: &str) -> LabelTable {
        LabelTable::from_lines(names).unwrap()
    }

    #[test]
    fn softmax_sums_to_one() {
        let p = softmax(&[2.0, 1.0, 0.1]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((p[0] - 0.659).abs() < 5e-4);
        assert!((p[1] - 0.242).abs() < 5e-4);
        assert!((p[2] - 0.099).abs() < 5e-4);
    }

    #[test]
    fn softmax_survives_huge_logits() {
        let p = softmax(&[1000.0, 1000.0, -1000.0]);
        assert!(p.iter().all(|v| v.is_finite()));
        assert!((p[0] - 0.5).abs() < 1e-12);
        assert!(p[2] < 1e-300);
    }

    #[test]
    fn ties_break_by_ascending_index() {
        let order = top_k(&[0.2, 0.3, 0.2, 0.3], 4).unwrap();
        assert_eq!(order, [1, 3, 0, 2]);
    }

    #[test]
    fn k_clamped_and_zero_rejected() {
        assert_eq!(top_k(&[0.1, 0.9], 5).unwrap(), [1, 0]);
        assert!(matches!(
            top_k(&[0.1, 0.9], 0),
            Err(ClassifyError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rank_maps_labels() {
        let logits = Array2::from_shape_vec((1, 3), vec![0.1, 2.0, 1.0]).unwrap();
        let ranked = rank(&logits, &labels("A\nB\nC"), 2).unwrap();
        let names: Vec<_> = ranked.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(names, ["B", "C"]);
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn rank_rejects_shape_mismatch() {
        let logits = Array2::from_shape_vec((1, 2), vec![0.1, 2.0]).unwrap();
        assert!(matches!(
            rank(&logits, &labels("A\nB\nC"), 3),
            Err(ClassifyError::Inference(_))
        ));
        let batched = Array2::from_shape_vec((3, 1), vec![0.1, 2.0, 1.0]).unwrap();
        assert!(matches!(
            rank(&batched, &labels("A\nB\nC"), 3),
            Err(ClassifyError::Inference(_))
        ));
    }

    #[test]
    fn rank_rejects_nan() {
        let logits = Array2::from_shape_vec((1, 2), vec![f32::NAN, 2.0]).unwrap();
        assert!(rank(&logits, &labels("A\nB"), 1).is_err());
    }

    #[test]
    fn percentage_rounds_to_two_places() {
        let label = ClassLabel {
            label: "cod".to_owned(),
            score: 0.242_433,
        };
        assert!((label.percentage() - 24.24).abs() < 1e-9);
    }

    #[test]
    fn serializes_with_percentage() {
        let label = ClassLabel {
            label: "cod".to_owned(),
            score: 0.5,
        };
        let json = serde_json::to_value(&label).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"label": "cod", "score": 0.5, "percentage": 50.0})
        );
    }
}
