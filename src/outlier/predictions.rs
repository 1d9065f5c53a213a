//! Out-of-distribution scores from predicted probabilities alone.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::data::{check_aligned, LabelSet, ProbabilityMatrix};
use crate::error::Result;
use crate::scoring::{normalized_entropy, threshold_adjusted_probs};

/// How an example's probability vector is turned into an OOD score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OodMethod {
    /// `1 - normalised entropy`.
    #[default]
    Entropy,
    /// Largest predicted probability.
    LeastConfidence,
}

impl OodMethod {
    pub fn score(&self, probs: ArrayView1<'_, f64>) -> f64 {
        match self {
            OodMethod::Entropy => 1.0 - normalized_entropy(probs),
            OodMethod::LeastConfidence => probs.iter().copied().fold(0.0, f64::max),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OodMethod::Entropy => "entropy",
            OodMethod::LeastConfidence => "least_confidence",
        }
    }
}

impl fmt::Display for OodMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for OodMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "entropy" => Ok(OodMethod::Entropy),
            "least_confidence" => Ok(OodMethod::LeastConfidence),
            other => Err(format!("unknown OOD method '{}'", other)),
        }
    }
}

/// Scores each example's predictions; lower is more likely out of
/// distribution.
///
/// With `labels`, the probabilities are first adjusted by the per-class
/// confidence thresholds learned from those labels.
pub fn prediction_ood_scores(
    probs: &ProbabilityMatrix,
    labels: Option<&LabelSet>,
    method: OodMethod,
) -> Result<Vec<f64>> {
    let adjusted: Array2<f64> = match labels {
        Some(labels) => {
            check_aligned(labels, probs)?;
            threshold_adjusted_probs(labels, probs)?
        }
        None => probs.view().to_owned(),
    };
    Ok(adjusted.rows().into_iter().map(|row| method.score(row)).collect())
}
