//! Calibration of the confident joint against the observed label marginal.

use ndarray::Array2;
use ordered_float::OrderedFloat;
use tracing::debug;

use crate::data::LabelSet;
use crate::error::EstimationError;

use super::confident::ConfidentJoint;

/// Joint distribution of (given label, true label) calibrated so that row
/// sums equal the empirical given-label frequencies.
///
/// Rows index the given label, columns the estimated true class.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedJoint {
    joint: Array2<f64>,
    counts: Array2<usize>,
    num_examples: usize,
}

impl CalibratedJoint {
    /// Calibrates a confident joint; see [`calibrate_joint`].
    pub fn calibrate(
        confident: &ConfidentJoint,
        labels: &LabelSet,
    ) -> Result<Self, EstimationError> {
        let k = confident.num_classes();
        if k != labels.num_classes() {
            return Err(EstimationError::ClassCountMismatch {
                joint: k,
                labels: labels.num_classes(),
            });
        }
        if confident.assignments().len() != labels.len() {
            return Err(EstimationError::ExampleCountMismatch {
                joint: confident.assignments().len(),
                labels: labels.len(),
            });
        }

        let label_counts = labels.class_counts();
        let raw = confident.counts();
        let mut calibrated = Array2::<f64>::zeros((k, k));

        for given in 0..k {
            let row_sum = confident.row_sum(given);
            if row_sum == 0 {
                return Err(EstimationError::EmptyConfidentRow { class: given });
            }
            let scale = label_counts[given] as f64 / row_sum as f64;
            for true_class in 0..k {
                calibrated[[given, true_class]] = raw[[given, true_class]] as f64 * scale;
            }
        }

        let n = labels.len() as f64;
        let total = calibrated.sum();
        calibrated.mapv_inplace(|v| v / total * n);

        let counts = round_preserving_row_totals(&calibrated, label_counts);
        let joint = calibrated.mapv(|v| v / n);

        debug!(
            examples = labels.len(),
            estimated_issues = off_diagonal_sum(&counts),
            "Calibrated confident joint"
        );

        Ok(Self {
            joint,
            counts,
            num_examples: labels.len(),
        })
    }

    /// Joint probabilities; entries in `[0, 1]`, total 1.
    pub fn joint(&self) -> &Array2<f64> {
        &self.joint
    }

    /// Calibrated integer counts; row `i` sums to the count of label `i`.
    pub fn calibrated_counts(&self) -> &Array2<usize> {
        &self.counts
    }

    pub fn num_classes(&self) -> usize {
        self.joint.nrows()
    }

    pub fn num_examples(&self) -> usize {
        self.num_examples
    }

    /// Expected number of examples with the given label but another true class.
    pub fn expected_issues(&self, given: usize, true_class: usize) -> f64 {
        self.joint[[given, true_class]] * self.num_examples as f64
    }

    /// Integer issue counts per (given, true) pair with a zeroed diagonal.
    pub fn issue_counts(&self) -> Array2<usize> {
        let mut counts = self.counts.clone();
        for i in 0..counts.nrows() {
            counts[[i, i]] = 0;
        }
        counts
    }

    /// Estimated number of label issues in the dataset.
    pub fn num_label_issues(&self) -> usize {
        off_diagonal_sum(&self.counts)
    }
}

/// Rescales a confident joint into a calibrated joint distribution.
///
/// # Errors
///
/// `EstimationError::ClassCountMismatch` or `EstimationError::ExampleCountMismatch`
/// if `labels` are not the labels the joint was estimated from, and
/// `EstimationError::EmptyConfidentRow` if a class received no confident
/// examples.
pub fn calibrate_joint(
    confident: &ConfidentJoint,
    labels: &LabelSet,
) -> Result<CalibratedJoint, EstimationError> {
    CalibratedJoint::calibrate(confident, labels)
}

fn off_diagonal_sum(counts: &Array2<usize>) -> usize {
    counts.sum() - counts.diag().sum()
}

/// Rounds each row to integers whose total equals `row_totals[i]`.
///
/// Entries are floored, then the remaining units go to the largest
/// fractional parts (ties to the lowest column).
pub(crate) fn round_preserving_row_totals(
    values: &Array2<f64>,
    row_totals: &[usize],
) -> Array2<usize> {
    let mut rounded = Array2::<usize>::zeros(values.raw_dim());

    for (i, row) in values.rows().into_iter().enumerate() {
        let mut order: Vec<usize> = (0..row.len()).collect();
        // Largest remainder first, lowest column on ties.
        order.sort_by_key(|&j| (std::cmp::Reverse(OrderedFloat(row[j] - row[j].floor())), j));

        let mut assigned = 0usize;
        for (j, &v) in row.iter().enumerate() {
            let floor = v.max(0.0).floor() as usize;
            rounded[[i, j]] = floor;
            assigned += floor;
        }

        let target = row_totals[i];
        let mut cursor = order.iter().cycle();
        while assigned < target {
            if let Some(&j) = cursor.next() {
                rounded[[i, j]] += 1;
                assigned += 1;
            }
        }
        // Float error can push the floors above the target; trim smallest remainders.
        let mut cursor = order.iter().rev().cycle();
        while assigned > target {
            if let Some(&j) = cursor.next() {
                if rounded[[i, j]] > 0 {
                    rounded[[i, j]] -= 1;
                    assigned -= 1;
                }
            }
        }
    }

    rounded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ProbabilityMatrix;
    use ndarray::array;

    fn confident_for(labels: &LabelSet, probs: ndarray::Array2<f64>) -> ConfidentJoint {
        let probs = ProbabilityMatrix::new(probs).expect("probs");
        ConfidentJoint::estimate(labels, &probs).expect("joint")
    }

    #[test]
    fn test_row_sums_match_label_frequency() {
        let labels = LabelSet::new(vec![0, 0, 0, 1, 1], 2).expect("labels");
        // Example 2 is unassigned, so the raw row for class 0 undercounts.
        let cj = confident_for(
            &labels,
            array![[0.9, 0.1], [0.8, 0.2], [0.5, 0.5], [0.1, 0.9], [0.3, 0.7]],
        );
        assert_eq!(cj.row_sum(0), 2);

        let calibrated = calibrate_joint(&cj, &labels).expect("calibrated");
        let joint = calibrated.joint();
        assert!((joint.sum() - 1.0).abs() < 1e-12);
        assert!((joint.row(0).sum() - 0.6).abs() < 1e-12);
        assert!((joint.row(1).sum() - 0.4).abs() < 1e-12);
        assert_eq!(calibrated.calibrated_counts().row(0).sum(), 3);
        assert_eq!(calibrated.calibrated_counts().row(1).sum(), 2);
    }

    #[test]
    fn test_expected_issues_for_planted_error() {
        let labels = LabelSet::new(vec![0, 0, 1, 1, 2, 2], 3).expect("labels");
        let cj = confident_for(
            &labels,
            array![
                [0.9, 0.05, 0.05],
                [0.05, 0.9, 0.05],
                [0.05, 0.9, 0.05],
                [0.05, 0.9, 0.05],
                [0.05, 0.05, 0.9],
                [0.05, 0.05, 0.9],
            ],
        );
        let calibrated = calibrate_joint(&cj, &labels).expect("calibrated");
        assert!((calibrated.expected_issues(0, 1) - 1.0).abs() < 1e-9);
        assert_eq!(calibrated.num_label_issues(), 1);
        assert_eq!(calibrated.issue_counts()[[0, 1]], 1);
        assert_eq!(calibrated.issue_counts()[[0, 0]], 0);
    }

    #[test]
    fn test_class_count_mismatch() {
        let labels = LabelSet::new(vec![0, 1], 2).expect("labels");
        let cj = confident_for(&labels, array![[0.9, 0.1], [0.1, 0.9]]);
        let other = LabelSet::new(vec![0, 1, 2], 3).expect("labels");
        assert!(matches!(
            calibrate_joint(&cj, &other),
            Err(EstimationError::ClassCountMismatch { joint: 2, labels: 3 })
        ));
    }

    #[test]
    fn test_example_count_mismatch() {
        let labels = LabelSet::new(vec![0, 1], 2).expect("labels");
        let cj = confident_for(&labels, array![[0.9, 0.1], [0.1, 0.9]]);
        let longer = LabelSet::new(vec![0, 1, 1, 0], 2).expect("labels");
        assert!(matches!(
            calibrate_joint(&cj, &longer),
            Err(EstimationError::ExampleCountMismatch { joint: 2, labels: 4 })
        ));
    }

    #[test]
    fn test_round_preserving_row_totals() {
        let values = array![[1.4, 1.3, 0.3], [0.5, 0.5, 0.0]];
        let rounded = round_preserving_row_totals(&values, &[3, 1]);
        assert_eq!(rounded, array![[2, 1, 0], [1, 0, 0]]);
    }
}
