//! Label quality scoring.
//!
//! Turns each example's predicted probabilities and given label into a
//! bounded score in `[0, 1]`; lower scores are more likely to be label
//! errors. The scoring formula is a [`ScoringMethod`] variant.

mod methods;

pub use methods::{label_quality_score, normalized_entropy, ScoringMethod};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data::{check_aligned, LabelSet, ProbabilityMatrix};
use crate::error::Result;
use crate::joint::class_thresholds;

/// Options for batch scoring.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoringOptions {
    pub method: ScoringMethod,
    /// Subtract per-class confidence thresholds before scoring, so classes
    /// the model is systematically over-confident in are not favoured.
    #[serde(default)]
    pub adjust_pred_probs: bool,
}

impl ScoringOptions {
    pub fn new(method: ScoringMethod) -> Self {
        Self {
            method,
            adjust_pred_probs: false,
        }
    }

    pub fn with_adjusted_probs(mut self, adjust: bool) -> Self {
        self.adjust_pred_probs = adjust;
        self
    }
}

/// Scores every example.
///
/// # Errors
///
/// Input alignment errors; with `adjust_pred_probs`, also
/// `EstimationError::UndefinedThreshold` for classes without examples.
pub fn label_quality_scores(
    labels: &LabelSet,
    probs: &ProbabilityMatrix,
    options: &ScoringOptions,
) -> Result<Vec<f64>> {
    check_aligned(labels, probs)?;

    if options.adjust_pred_probs {
        let adjusted = threshold_adjusted_probs(labels, probs)?;
        return Ok(score_rows(labels, &adjusted, options.method));
    }

    Ok(score_rows(labels, &probs.view().to_owned(), options.method))
}

/// Subtracts per-class thresholds, shifts back to non-negative and
/// renormalises each row.
pub fn threshold_adjusted_probs(
    labels: &LabelSet,
    probs: &ProbabilityMatrix,
) -> Result<Array2<f64>> {
    check_aligned(labels, probs)?;
    let thresholds = class_thresholds(labels, probs)?;
    let max_threshold = thresholds.iter().copied().fold(f64::MIN, f64::max);

    let mut adjusted = probs.view().to_owned();
    for mut row in adjusted.rows_mut() {
        for (value, &t) in row.iter_mut().zip(&thresholds) {
            *value = *value - t + max_threshold;
        }
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
    Ok(adjusted)
}

fn score_rows(labels: &LabelSet, probs: &Array2<f64>, method: ScoringMethod) -> Vec<f64> {
    labels
        .iter()
        .zip(probs.rows())
        .map(|(label, row)| method.score(label, row))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn inputs() -> (LabelSet, ProbabilityMatrix) {
        let labels = LabelSet::new(vec![0, 1, 1], 2).expect("labels");
        let probs =
            ProbabilityMatrix::new(array![[0.9, 0.1], [0.3, 0.7], [0.8, 0.2]]).expect("probs");
        (labels, probs)
    }

    #[test]
    fn test_batch_matches_single() {
        let (labels, probs) = inputs();
        for method in ScoringMethod::ALL {
            let scores = label_quality_scores(&labels, &probs, &ScoringOptions::new(method))
                .expect("scores");
            for (i, score) in scores.iter().enumerate() {
                let row: Vec<f64> = probs.row(i).to_vec();
                let single = label_quality_score(labels.as_slice()[i], &row, method).unwrap();
                assert_eq!(*score, single);
            }
        }
    }

    #[test]
    fn test_adjusted_probs_rows_sum_to_one() {
        let (labels, probs) = inputs();
        let adjusted = threshold_adjusted_probs(&labels, &probs).expect("adjusted");
        for row in adjusted.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
            assert!(row.iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn test_adjusted_scores_keep_order_of_worst() {
        let (labels, probs) = inputs();
        let options = ScoringOptions::new(ScoringMethod::SelfConfidence).with_adjusted_probs(true);
        let scores = label_quality_scores(&labels, &probs, &options).expect("scores");
        assert!(scores[2] < scores[1]);
        assert!(scores[2] < scores[0]);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let labels = LabelSet::new(vec![0, 1], 2).expect("labels");
        let probs = ProbabilityMatrix::new(array![[0.9, 0.1]]).expect("probs");
        assert!(label_quality_scores(&labels, &probs, &ScoringOptions::default()).is_err());
    }
}
