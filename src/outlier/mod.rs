//! Outlier detection.
//!
//! # Feature-based
//!
//! Each point's mean distance to its `k` nearest reference points is mapped
//! to `exp(-distance / scaling * t)`, where `scaling` is the median of the
//! reference points' own neighbour distances. Scores lie in `(0, 1]`, equal
//! 1 at distance 0 and decrease strictly with distance. The fitted
//! [`NeighborIndex`] can be returned and reused to score new data against
//! the same reference set.
//!
//! Neighbour search is exact and parallelised across query rows with rayon;
//! results do not depend on the thread count.
//!
//! # Prediction-based
//!
//! [`prediction_ood_scores`] scores examples from their predicted
//! probabilities alone, without features.

mod index;
mod metric;
mod predictions;
mod scores;

pub use index::{NeighborIndex, MIN_SCALING};
pub use metric::{cosine_similarity, euclidean_distance, DistanceMetric};
pub use predictions::{prediction_ood_scores, OodMethod};
pub use scores::{fit_outlier_index, outlier_scores, OutlierParams, OutlierScores, DEFAULT_K};
