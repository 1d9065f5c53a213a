//! Exact k-nearest-neighbour index over reference features.

use ndarray::{Array2, ArrayView1, ArrayView2};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{InputError, OutlierError};
use crate::filter::percentile;

use super::metric::DistanceMetric;

/// Lower bound of the score scaling factor.
pub const MIN_SCALING: f64 = 100.0 * f64::EPSILON;

/// Fitted neighbour index.
///
/// Owns a copy of the reference features together with the mean distance
/// of every reference point to its `k` nearest other reference points and
/// the scaling factor derived from them. Immutable once fitted.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborIndex {
    features: Array2<f64>,
    k: usize,
    metric: DistanceMetric,
    reference_distances: Vec<f64>,
    scaling: f64,
}

impl NeighborIndex {
    /// Fits the index. Without a metric, one is picked from the feature
    /// dimension (see [`DistanceMetric::for_dimension`]).
    ///
    /// # Errors
    ///
    /// - `OutlierError::InvalidNeighborCount` when `k` is 0
    /// - `OutlierError::TooFewReferencePoints` unless there are more than `k` rows
    /// - `OutlierError::Input` for empty or non-finite features
    pub fn fit(
        features: ArrayView2<'_, f64>,
        k: usize,
        metric: Option<DistanceMetric>,
    ) -> Result<Self, OutlierError> {
        if k == 0 {
            return Err(OutlierError::InvalidNeighborCount);
        }
        validate_features(features)?;
        if features.nrows() <= k {
            return Err(OutlierError::TooFewReferencePoints {
                points: features.nrows(),
                k,
            });
        }

        let metric = metric.unwrap_or_else(|| DistanceMetric::for_dimension(features.ncols()));
        let mut index = Self {
            features: features.to_owned(),
            k,
            metric,
            reference_distances: Vec::new(),
            scaling: 1.0,
        };

        index.reference_distances = index.mean_distances(features, true);
        let median = percentile(&index.reference_distances, 50.0);
        if median < MIN_SCALING {
            warn!(
                median,
                floor = MIN_SCALING,
                "Reference neighbour distances are near zero, using scaling floor"
            );
        }
        index.scaling = median.max(MIN_SCALING);

        debug!(
            points = index.len(),
            dimension = index.dimension(),
            k,
            %metric,
            scaling = index.scaling,
            "Fitted neighbour index"
        );
        Ok(index)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Number of reference points.
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }

    pub fn dimension(&self) -> usize {
        self.features.ncols()
    }

    pub fn scaling(&self) -> f64 {
        self.scaling
    }

    /// Mean distance of each reference point to its `k` nearest other
    /// reference points.
    pub fn reference_distances(&self) -> &[f64] {
        &self.reference_distances
    }

    /// The `k` nearest reference points of `query` as `(index, distance)`,
    /// ordered by distance then index. `skip` leaves one reference point out.
    pub fn nearest(&self, query: ArrayView1<'_, f64>, skip: Option<usize>) -> Vec<(usize, f64)> {
        let mut candidates: Vec<(OrderedFloat<f64>, usize)> = self
            .features
            .rows()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .map(|(i, row)| (OrderedFloat(self.metric.distance(query, row)), i))
            .collect();

        if candidates.len() > self.k {
            candidates.select_nth_unstable(self.k - 1);
            candidates.truncate(self.k);
        }
        candidates.sort_unstable();
        candidates.into_iter().map(|(d, i)| (i, d.0)).collect()
    }

    /// Mean distance of each query row to its `k` nearest reference points.
    ///
    /// # Errors
    ///
    /// `OutlierError::DimensionMismatch` when the query width differs from
    /// the reference width, and input errors for empty or non-finite rows.
    pub fn query(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>, OutlierError> {
        validate_features(features)?;
        if features.ncols() != self.dimension() {
            return Err(OutlierError::DimensionMismatch {
                expected: self.dimension(),
                found: features.ncols(),
            });
        }
        Ok(self.mean_distances(features, false))
    }

    /// Maps a mean neighbour distance to a score in `(0, 1]`.
    pub fn score(&self, distance: f64, t: f64) -> f64 {
        (-distance / self.scaling * t).exp()
    }

    fn mean_distances(&self, queries: ArrayView2<'_, f64>, exclude_self: bool) -> Vec<f64> {
        (0..queries.nrows())
            .into_par_iter()
            .map(|i| {
                let skip = exclude_self.then_some(i);
                let neighbors = self.nearest(queries.row(i), skip);
                neighbors.iter().map(|(_, d)| d).sum::<f64>() / neighbors.len() as f64
            })
            .collect()
    }
}

/// Rejects empty feature matrices and non-finite values.
pub(crate) fn validate_features(features: ArrayView2<'_, f64>) -> Result<(), InputError> {
    if features.nrows() == 0 || features.ncols() == 0 {
        return Err(InputError::Empty("features".to_string()));
    }
    for ((row, col), &value) in features.indexed_iter() {
        if !value.is_finite() {
            return Err(InputError::NonFiniteFeature { row, col, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn line() -> Array2<f64> {
        array![[0.0], [1.0], [2.0], [3.0], [10.0]]
    }

    #[test]
    fn test_fit_reference_distances_exclude_self() {
        let index = NeighborIndex::fit(line().view(), 1, None).expect("index");
        assert_eq!(index.metric(), DistanceMetric::Euclidean);
        assert_eq!(index.reference_distances(), &[1.0, 1.0, 1.0, 1.0, 7.0]);
        assert_eq!(index.scaling(), 1.0);
    }

    #[test]
    fn test_nearest_orders_by_distance_then_index() {
        let index = NeighborIndex::fit(line().view(), 2, None).expect("index");
        let query = array![1.5];
        assert_eq!(index.nearest(query.view(), None), vec![(1, 0.5), (2, 0.5)]);
    }

    #[test]
    fn test_fit_errors() {
        assert_eq!(
            NeighborIndex::fit(line().view(), 0, None),
            Err(OutlierError::InvalidNeighborCount)
        );
        assert_eq!(
            NeighborIndex::fit(line().view(), 5, None),
            Err(OutlierError::TooFewReferencePoints { points: 5, k: 5 })
        );
        let bad = array![[0.0], [f64::NAN], [1.0]];
        assert!(matches!(
            NeighborIndex::fit(bad.view(), 1, None),
            Err(OutlierError::Input(InputError::NonFiniteFeature { row: 1, .. }))
        ));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = NeighborIndex::fit(line().view(), 1, None).expect("index");
        let query = array![[0.0, 1.0]];
        assert_eq!(
            index.query(query.view()),
            Err(OutlierError::DimensionMismatch {
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn test_duplicate_points_hit_scaling_floor() {
        let same = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let index = NeighborIndex::fit(same.view(), 1, None).expect("index");
        assert_eq!(index.scaling(), MIN_SCALING);
        assert_eq!(index.score(0.0, 1.0), 1.0);
    }
}
