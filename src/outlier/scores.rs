//! Feature-based outlier scores.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OutlierError, Result};

use super::index::NeighborIndex;
use super::metric::DistanceMetric;

/// Neighbours averaged per point when `k` is not configured.
pub const DEFAULT_K: usize = 10;

/// Parameters for [`outlier_scores`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierParams {
    /// Neighbours per point; `None` uses [`DEFAULT_K`].
    pub k: Option<usize>,
    /// Distance metric; `None` picks one from the feature dimension.
    pub metric: Option<DistanceMetric>,
    /// Sharpness of the distance-to-score transform.
    pub t: f64,
}

impl Default for OutlierParams {
    fn default() -> Self {
        Self {
            k: None,
            metric: None,
            t: 1.0,
        }
    }
}

impl OutlierParams {
    pub fn k(&self) -> usize {
        self.k.unwrap_or(DEFAULT_K)
    }

    pub fn validate(&self) -> std::result::Result<(), OutlierError> {
        if self.k == Some(0) {
            return Err(OutlierError::InvalidNeighborCount);
        }
        if !self.t.is_finite() || self.t <= 0.0 {
            return Err(OutlierError::InvalidParameter(format!(
                "t must be positive and finite, got {}",
                self.t
            )));
        }
        Ok(())
    }
}

/// Output of [`outlier_scores`].
#[derive(Debug, Clone)]
pub struct OutlierScores {
    /// One score per feature row in `(0, 1]`; lower is more atypical.
    pub scores: Vec<f64>,
    /// The index used, when requested.
    pub index: Option<NeighborIndex>,
}

/// Fits a neighbour index over reference features.
///
/// See [`NeighborIndex::fit`].
pub fn fit_outlier_index(
    features: ArrayView2<'_, f64>,
    k: usize,
    metric: Option<DistanceMetric>,
) -> Result<NeighborIndex> {
    Ok(NeighborIndex::fit(features, k, metric)?)
}

/// Scores how atypical each feature row is.
///
/// Without an index, one is fitted on `features` and every row is scored
/// against the other rows. With an index, rows are scored against its
/// reference points and `params.k`/`params.metric` are ignored in favour of
/// the index's own. `return_index` hands back the index that was used.
///
/// # Errors
///
/// Parameter, fit and query errors of [`NeighborIndex`].
pub fn outlier_scores(
    features: ArrayView2<'_, f64>,
    index: Option<&NeighborIndex>,
    params: &OutlierParams,
    return_index: bool,
) -> Result<OutlierScores> {
    params.validate()?;

    let (distances, index) = match index {
        Some(index) => {
            if params.k.is_some_and(|k| k != index.k()) {
                debug!(
                    requested = params.k(),
                    fitted = index.k(),
                    "Using k of the supplied index"
                );
            }
            (index.query(features)?, index.clone())
        }
        None => {
            let index = NeighborIndex::fit(features, params.k(), params.metric)?;
            (index.reference_distances().to_vec(), index)
        }
    };

    let scores: Vec<f64> = distances.iter().map(|&d| index.score(d, params.t)).collect();
    debug!(points = scores.len(), "Scored outliers");

    Ok(OutlierScores {
        scores,
        index: return_index.then_some(index),
    })
}
