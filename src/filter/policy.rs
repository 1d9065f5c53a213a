//! Filtering policies and their outputs.

use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::EstimationError;

/// Cut-off applied by [`FilterPolicy::ScoreBased`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreThreshold {
    /// Percentile in `[0, 100]` of the score distribution (linear interpolation).
    Percentile(f64),
    /// Fixed score value.
    Absolute(f64),
}

impl ScoreThreshold {
    /// Resolves the threshold against a score distribution.
    pub fn resolve(&self, scores: &[f64]) -> Result<f64, EstimationError> {
        match *self {
            ScoreThreshold::Percentile(p) => {
                if !(0.0..=100.0).contains(&p) {
                    return Err(EstimationError::invalid(
                        "percentile",
                        format!("{} is outside [0, 100]", p),
                    ));
                }
                Ok(percentile(scores, p))
            }
            ScoreThreshold::Absolute(v) => {
                if !v.is_finite() {
                    return Err(EstimationError::invalid("threshold", "must be finite"));
                }
                Ok(v)
            }
        }
    }
}

/// How examples are selected as label issues.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterPolicy {
    /// Flag as many examples per (given, true) pair as the calibrated joint
    /// estimates, choosing the lowest-scoring confident candidates.
    #[default]
    CountBased,
    /// Flag examples scoring strictly below a threshold.
    ScoreBased { threshold: ScoreThreshold },
    /// Flag examples confidently assigned to a class other than their label.
    ConfidentOffDiagonal,
    /// Flag examples whose predicted class differs from their label.
    PredictedNeqGiven,
}

impl FilterPolicy {
    /// Whether the policy needs the confident joint.
    pub fn uses_joint(&self) -> bool {
        matches!(
            self,
            FilterPolicy::CountBased | FilterPolicy::ConfidentOffDiagonal
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            FilterPolicy::CountBased => "count_based",
            FilterPolicy::ScoreBased { .. } => "score_based",
            FilterPolicy::ConfidentOffDiagonal => "confident_off_diagonal",
            FilterPolicy::PredictedNeqGiven => "predicted_neq_given",
        }
    }
}

impl fmt::Display for FilterPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Issues found in a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelIssues {
    /// One flag per example.
    Mask(Vec<bool>),
    /// Flagged example indices, most suspicious first.
    Ranked(Vec<usize>),
}

impl LabelIssues {
    /// Indices of flagged examples, in ranked order when ranked.
    pub fn indices(&self) -> Vec<usize> {
        match self {
            LabelIssues::Mask(mask) => mask_to_indices(mask),
            LabelIssues::Ranked(indices) => indices.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LabelIssues::Mask(mask) => mask.iter().filter(|&&f| f).count(),
            LabelIssues::Ranked(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn mask_to_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter(|(_, &flagged)| flagged)
        .map(|(i, _)| i)
        .collect()
}

/// Orders indices by ascending score, ties by index.
pub fn rank_by_score(indices: &[usize], scores: &[f64]) -> Vec<usize> {
    let mut ranked = indices.to_vec();
    ranked.sort_by_key(|&i| (OrderedFloat(scores[i]), i));
    ranked
}

/// Linear-interpolation percentile, `p` in `[0, 100]`.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted: Vec<OrderedFloat<f64>> = values.iter().copied().map(OrderedFloat).collect();
    sorted.sort();

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower].0 + (sorted[upper].0 - sorted[lower].0) * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let values = [0.4, 0.1, 0.3, 0.2];
        assert!((percentile(&values, 0.0) - 0.1).abs() < 1e-12);
        assert!((percentile(&values, 100.0) - 0.4).abs() < 1e-12);
        assert!((percentile(&values, 50.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_rejects_bad_percentile() {
        assert!(ScoreThreshold::Percentile(120.0).resolve(&[0.5]).is_err());
        assert_eq!(ScoreThreshold::Absolute(0.3).resolve(&[]), Ok(0.3));
    }

    #[test]
    fn test_rank_by_score_ties_by_index() {
        let scores = [0.5, 0.1, 0.5, 0.1];
        assert_eq!(rank_by_score(&[0, 1, 2, 3], &scores), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_label_issues_indices() {
        let mask = LabelIssues::Mask(vec![false, true, true]);
        assert_eq!(mask.indices(), vec![1, 2]);
        assert_eq!(mask.len(), 2);
        assert!(LabelIssues::Ranked(vec![]).is_empty());
    }

    #[test]
    fn test_policy_serde_shape() {
        let policy: FilterPolicy =
            serde_json::from_str(r#"{"kind":"score_based","threshold":{"percentile":10.0}}"#)
                .expect("parse");
        assert_eq!(
            policy,
            FilterPolicy::ScoreBased {
                threshold: ScoreThreshold::Percentile(10.0)
            }
        );
    }
}
