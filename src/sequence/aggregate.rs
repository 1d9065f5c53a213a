//! Folding token scores into one sequence score.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EstimationError;

/// Default soft-minimum temperature.
pub const DEFAULT_SOFTMIN_TEMPERATURE: f64 = 0.05;

/// How token scores are combined into a sequence score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SequenceAggregation {
    /// Worst token.
    #[default]
    Min,
    /// Arithmetic mean.
    Mean,
    /// `Σ s_i · softmax(1 - s / T)_i`: approaches `Min` as `T → 0` and
    /// `Mean` as `T → ∞`.
    Softmin { temperature: f64 },
}

impl SequenceAggregation {
    pub fn softmin() -> Self {
        SequenceAggregation::Softmin {
            temperature: DEFAULT_SOFTMIN_TEMPERATURE,
        }
    }

    /// Rejects negative or NaN temperatures.
    pub fn validate(&self) -> Result<(), EstimationError> {
        if let SequenceAggregation::Softmin { temperature } = *self {
            if temperature.is_nan() || temperature < 0.0 {
                return Err(EstimationError::invalid(
                    "temperature",
                    format!("{} must be non-negative", temperature),
                ));
            }
        }
        Ok(())
    }

    /// Aggregates one sequence's token scores. `scores` must be non-empty.
    pub fn aggregate(&self, scores: &[f64]) -> f64 {
        match *self {
            SequenceAggregation::Min => min(scores),
            SequenceAggregation::Mean => mean(scores),
            SequenceAggregation::Softmin { temperature } => {
                if temperature == 0.0 {
                    return min(scores);
                }
                if temperature.is_infinite() {
                    return mean(scores);
                }
                // Shifted by the minimum so the worst token has logit 0 and
                // tiny temperatures cannot overflow the exponent.
                let lowest = min(scores);
                let weights: Vec<f64> = scores
                    .iter()
                    .map(|s| (-(s - lowest) / temperature).exp())
                    .collect();
                let total: f64 = weights.iter().sum();
                scores
                    .iter()
                    .zip(&weights)
                    .map(|(s, w)| s * w / total)
                    .sum()
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SequenceAggregation::Min => "min",
            SequenceAggregation::Mean => "mean",
            SequenceAggregation::Softmin { .. } => "softmin",
        }
    }
}

impl fmt::Display for SequenceAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceAggregation::Softmin { temperature } => write!(f, "softmin(T={})", temperature),
            other => write!(f, "{}", other.name()),
        }
    }
}

fn min(scores: &[f64]) -> f64 {
    scores.iter().copied().fold(f64::INFINITY, f64::min)
}

fn mean(scores: &[f64]) -> f64 {
    scores.iter().sum::<f64>() / scores.len() as f64
}
