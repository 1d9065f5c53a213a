//! Distance metrics between feature vectors.

use std::fmt;
use std::str::FromStr;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Feature dimension above which cosine distance is the default.
const COSINE_MIN_DIMENSION: usize = 4;

/// Distance between two feature vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - cosine similarity`; a zero vector has similarity 0 with everything.
    Cosine,
    Euclidean,
    Manhattan,
}

impl DistanceMetric {
    pub const ALL: [DistanceMetric; 3] = [
        DistanceMetric::Cosine,
        DistanceMetric::Euclidean,
        DistanceMetric::Manhattan,
    ];

    /// Metric used when none is configured: cosine for high-dimensional
    /// features, Euclidean for up to three dimensions.
    pub fn for_dimension(dimension: usize) -> Self {
        if dimension >= COSINE_MIN_DIMENSION {
            DistanceMetric::Cosine
        } else {
            DistanceMetric::Euclidean
        }
    }

    pub fn distance(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        match self {
            DistanceMetric::Cosine => (1.0 - cosine_similarity(a, b)).max(0.0),
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Manhattan => "manhattan",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" => Ok(DistanceMetric::Euclidean),
            "manhattan" | "cityblock" => Ok(DistanceMetric::Manhattan),
            other => Err(format!("unknown distance metric '{}'", other)),
        }
    }
}

/// Cosine similarity, 0 when either vector has zero norm.
pub fn cosine_similarity(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let dot_product: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a < 1e-10 || norm_b < 1e-10 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

pub fn euclidean_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
