//! Confident joint estimation.
//!
//! Counts, per (given label, predicted class) pair, how many examples are
//! confidently assigned to the predicted class under per-class thresholds.

use ndarray::{Array2, ArrayView1};
use tracing::{debug, warn};

use crate::data::{check_aligned, LabelSet, ProbabilityMatrix};
use crate::error::{EstimationError, Result};

/// Slack subtracted from each threshold so a class whose members all carry
/// the same probability still counts as confident despite float error in
/// the mean.
const THRESHOLD_EPSILON: f64 = 1e-6;

/// Fraction of unassigned examples above which a warning is emitted.
const UNASSIGNED_WARN_FRACTION: f64 = 0.5;

/// Confident joint counts plus the assignment each example received.
///
/// Rows index the given label, columns the confidently assigned class.
/// Examples for which no class clears its threshold are left out of the
/// counts and recorded as unassigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidentJoint {
    counts: Array2<usize>,
    thresholds: Vec<f64>,
    assignments: Vec<Option<usize>>,
}

impl ConfidentJoint {
    /// Estimates the confident joint for aligned labels and probabilities.
    ///
    /// # Errors
    ///
    /// Input shape errors from alignment, and
    /// `EstimationError::UndefinedThreshold` for a class with no examples.
    pub fn estimate(labels: &LabelSet, probs: &ProbabilityMatrix) -> Result<Self> {
        check_aligned(labels, probs)?;
        let thresholds = class_thresholds(labels, probs)?;
        let k = labels.num_classes();

        let assignments: Vec<Option<usize>> = probs
            .view()
            .rows()
            .into_iter()
            .map(|row| confident_class(row, &thresholds))
            .collect();

        let mut counts = Array2::<usize>::zeros((k, k));
        for (given, assigned) in labels.iter().zip(assignments.iter()) {
            if let Some(assigned) = assigned {
                counts[[given, *assigned]] += 1;
            }
        }

        let joint = Self {
            counts,
            thresholds,
            assignments,
        };

        let unassigned = joint.unassigned_count();
        debug!(
            examples = labels.len(),
            classes = k,
            diagonal = joint.diagonal_sum(),
            unassigned,
            "Estimated confident joint"
        );
        if unassigned as f64 > UNASSIGNED_WARN_FRACTION * labels.len() as f64 {
            warn!(
                unassigned,
                examples = labels.len(),
                "Most examples clear no class threshold; predicted probabilities may be poorly calibrated"
            );
        }

        Ok(joint)
    }

    /// Raw counts; rows are given labels, columns assigned classes.
    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    pub fn num_classes(&self) -> usize {
        self.counts.nrows()
    }

    /// Per-class mean self-confidence thresholds.
    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// Class each example was confidently assigned to, if any.
    pub fn assignments(&self) -> &[Option<usize>] {
        &self.assignments
    }

    pub fn assignment(&self, index: usize) -> Option<usize> {
        self.assignments.get(index).copied().flatten()
    }

    /// Number of examples that cleared no threshold.
    pub fn unassigned_count(&self) -> usize {
        self.assignments.iter().filter(|a| a.is_none()).count()
    }

    /// Sum of the diagonal: examples confidently agreeing with their label.
    pub fn diagonal_sum(&self) -> usize {
        self.counts.diag().sum()
    }

    /// Number of examples counted in the joint.
    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    /// Sum of row `given`.
    pub fn row_sum(&self, given: usize) -> usize {
        self.counts.row(given).sum()
    }
}

/// Estimates the confident joint; see [`ConfidentJoint::estimate`].
pub fn estimate_confident_joint(
    labels: &LabelSet,
    probs: &ProbabilityMatrix,
) -> Result<ConfidentJoint> {
    ConfidentJoint::estimate(labels, probs)
}

/// Mean predicted probability of class `j` over examples labelled `j`.
///
/// # Errors
///
/// `EstimationError::UndefinedThreshold` when a class has no examples.
pub fn class_thresholds(
    labels: &LabelSet,
    probs: &ProbabilityMatrix,
) -> std::result::Result<Vec<f64>, EstimationError> {
    let k = labels.num_classes();
    let mut sums = vec![0.0f64; k];
    for (i, label) in labels.iter().enumerate() {
        sums[label] += probs.row(i)[label];
    }

    labels
        .class_counts()
        .iter()
        .zip(sums)
        .enumerate()
        .map(|(class, (&count, sum))| {
            if count == 0 {
                Err(EstimationError::UndefinedThreshold { class })
            } else {
                Ok(sum / count as f64)
            }
        })
        .collect()
}

/// Highest-probability class among those clearing their threshold.
///
/// Ties resolve to the lowest class index; `None` if no class qualifies.
pub fn confident_class(row: ArrayView1<'_, f64>, thresholds: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (j, (&p, &t)) in row.iter().zip(thresholds).enumerate() {
        if p < t - THRESHOLD_EPSILON {
            continue;
        }
        match best {
            Some(b) if row[b] >= p => {}
            _ => best = Some(j),
        }
    }
    best
}
