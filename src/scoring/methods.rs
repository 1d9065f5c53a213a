//! Per-example label quality scoring methods.

use std::fmt;
use std::str::FromStr;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::data::{check_probability_row, DEFAULT_ROW_SUM_TOLERANCE};
use crate::error::InputError;

/// Lower clip applied to probabilities and ratios to keep logs finite.
const CLIP_LOWER_BOUND: f64 = 1e-6;

/// Formula used to turn a probability vector and given label into a score.
///
/// Every method returns a value in `[0, 1]`; lower means the prediction
/// disagrees more with the given label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMethod {
    /// Probability of the given label.
    #[default]
    SelfConfidence,
    /// Self-confidence minus the largest other probability, mapped to `[0, 1]`.
    NormalizedMargin,
    /// Entropy relative to self-confidence, squashed by `ln(1 + x) / x`.
    ConfidenceWeightedEntropy,
}

impl ScoringMethod {
    pub const ALL: [ScoringMethod; 3] = [
        ScoringMethod::SelfConfidence,
        ScoringMethod::NormalizedMargin,
        ScoringMethod::ConfidenceWeightedEntropy,
    ];

    /// Scores one validated probability row. `label` must index into `probs`.
    pub(crate) fn score(&self, label: usize, probs: ArrayView1<'_, f64>) -> f64 {
        let self_confidence = probs[label];
        match self {
            ScoringMethod::SelfConfidence => self_confidence,
            ScoringMethod::NormalizedMargin => {
                let max_other = probs
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != label)
                    .map(|(_, &p)| p)
                    .fold(0.0f64, f64::max);
                ((self_confidence - max_other + 1.0) / 2.0).clamp(0.0, 1.0)
            }
            ScoringMethod::ConfidenceWeightedEntropy => {
                let ratio = normalized_entropy(probs) / self_confidence.max(CLIP_LOWER_BOUND);
                let ratio = ratio.max(CLIP_LOWER_BOUND);
                ((1.0 + ratio).ln() / ratio).clamp(0.0, 1.0)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScoringMethod::SelfConfidence => "self_confidence",
            ScoringMethod::NormalizedMargin => "normalized_margin",
            ScoringMethod::ConfidenceWeightedEntropy => "confidence_weighted_entropy",
        }
    }
}

impl fmt::Display for ScoringMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ScoringMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "self_confidence" => Ok(ScoringMethod::SelfConfidence),
            "normalized_margin" => Ok(ScoringMethod::NormalizedMargin),
            "confidence_weighted_entropy" => Ok(ScoringMethod::ConfidenceWeightedEntropy),
            other => Err(format!(
                "unknown scoring method '{}': expected self_confidence, normalized_margin or confidence_weighted_entropy",
                other
            )),
        }
    }
}

/// Shannon entropy divided by `ln K`; 0 for a one-hot row, 1 for uniform.
pub fn normalized_entropy(probs: ArrayView1<'_, f64>) -> f64 {
    let k = probs.len();
    if k < 2 {
        return 0.0;
    }
    let entropy: f64 = probs
        .iter()
        .map(|&p| {
            let p = p.max(CLIP_LOWER_BOUND);
            -p * p.ln()
        })
        .sum();
    (entropy / (k as f64).ln()).clamp(0.0, 1.0)
}

/// Quality score of one example.
///
/// # Errors
///
/// - `InputError::Empty` for an empty vector
/// - `InputError::LabelOutOfRange` when `label >= probs.len()`
/// - `InputError::InvalidProbability` for negative or non-finite entries
/// - `InputError::RowSumOutOfTolerance` if the vector does not sum to ≈1
pub fn label_quality_score(
    label: usize,
    probs: &[f64],
    method: ScoringMethod,
) -> Result<f64, InputError> {
    if probs.is_empty() {
        return Err(InputError::Empty("probability vector".to_string()));
    }
    if label >= probs.len() {
        return Err(InputError::LabelOutOfRange {
            index: 0,
            label,
            num_classes: probs.len(),
        });
    }
    let probs = ArrayView1::from(probs);
    check_probability_row(0, probs, DEFAULT_ROW_SUM_TOLERANCE)?;
    Ok(method.score(label, probs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_confidence_identity() {
        let probs = [0.2, 0.7, 0.1];
        for label in 0..3 {
            let score = label_quality_score(label, &probs, ScoringMethod::SelfConfidence)
                .expect("score");
            assert_eq!(score, probs[label]);
        }
    }

    #[test]
    fn test_normalized_margin() {
        let probs = [0.2, 0.7, 0.1];
        let agree = label_quality_score(1, &probs, ScoringMethod::NormalizedMargin).unwrap();
        let disagree = label_quality_score(0, &probs, ScoringMethod::NormalizedMargin).unwrap();
        assert!((agree - 0.75).abs() < 1e-12);
        assert!((disagree - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_margin_single_class() {
        let score = label_quality_score(0, &[1.0], ScoringMethod::NormalizedMargin).unwrap();
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_entropy_confident_correct_is_near_one() {
        let score =
            label_quality_score(0, &[1.0, 0.0, 0.0], ScoringMethod::ConfidenceWeightedEntropy)
                .unwrap();
        assert!(score > 0.99);
    }

    #[test]
    fn test_entropy_penalizes_confident_wrong_more_than_uncertain() {
        let method = ScoringMethod::ConfidenceWeightedEntropy;
        let confident_wrong = label_quality_score(0, &[0.05, 0.9, 0.05], method).unwrap();
        let uncertain = label_quality_score(0, &[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0], method).unwrap();
        assert!(confident_wrong < uncertain);
        assert!((0.0..=1.0).contains(&confident_wrong));
    }

    #[test]
    fn test_all_methods_monotone_in_disagreement() {
        for method in ScoringMethod::ALL {
            let agree = label_quality_score(0, &[0.8, 0.1, 0.1], method).unwrap();
            let mild = label_quality_score(0, &[0.4, 0.5, 0.1], method).unwrap();
            let strong = label_quality_score(0, &[0.05, 0.9, 0.05], method).unwrap();
            assert!(agree > mild, "{method}: {agree} <= {mild}");
            assert!(mild > strong, "{method}: {mild} <= {strong}");
        }
    }

    #[test]
    fn test_rejects_bad_label() {
        assert!(matches!(
            label_quality_score(3, &[0.5, 0.5], ScoringMethod::SelfConfidence),
            Err(InputError::LabelOutOfRange { label: 3, .. })
        ));
        assert!(matches!(
            label_quality_score(0, &[], ScoringMethod::SelfConfidence),
            Err(InputError::Empty(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_probability_vector() {
        assert!(matches!(
            label_quality_score(0, &[2.0, -1.0], ScoringMethod::SelfConfidence),
            Err(InputError::InvalidProbability { col: 1, .. })
        ));
        assert!(matches!(
            label_quality_score(0, &[f64::NAN, 1.0], ScoringMethod::SelfConfidence),
            Err(InputError::InvalidProbability { col: 0, .. })
        ));
        assert!(matches!(
            label_quality_score(0, &[0.6, 0.6], ScoringMethod::NormalizedMargin),
            Err(InputError::RowSumOutOfTolerance { .. })
        ));
    }

    #[test]
    fn test_method_parse_and_display() {
        assert_eq!(
            "normalized-margin".parse::<ScoringMethod>(),
            Ok(ScoringMethod::NormalizedMargin)
        );
        assert!("bogus".parse::<ScoringMethod>().is_err());
        assert_eq!(
            ScoringMethod::ConfidenceWeightedEntropy.to_string(),
            "confidence_weighted_entropy"
        );
    }
}
