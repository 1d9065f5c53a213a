//! Synthetic noisy-label datasets.
//!
//! Generates ground-truth labels, a noisy copy flipped according to a noise
//! matrix, and Dirichlet-distributed predicted probabilities that lean
//! towards the true class. Used to benchmark the detectors against known
//! errors.
//!
//! The noise matrix is column-stochastic: entry `[given][true]` is
//! `P(given label | true label)`.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{LabelSet, ProbabilityMatrix};
use crate::error::{EstimationError, InputError, Result};
use crate::joint::round_preserving_row_totals;

const COLUMN_SUM_TOLERANCE: f64 = 1e-6;

/// Settings for [`generate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub num_examples: usize,
    pub num_classes: usize,
    /// Fraction of each class whose label is flipped.
    pub noise_rate: f64,
    /// Dirichlet concentration shared by every class.
    pub concentration: f64,
    /// Extra concentration on the true class.
    pub signal: f64,
    /// Seed for reproducible output; `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            num_examples: 1000,
            num_classes: 3,
            noise_rate: 0.1,
            concentration: 1.0,
            signal: 6.0,
            seed: None,
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> std::result::Result<(), EstimationError> {
        if self.num_classes < 2 {
            return Err(EstimationError::invalid("num_classes", "at least 2 classes required"));
        }
        if self.num_examples < self.num_classes {
            return Err(EstimationError::invalid(
                "num_examples",
                format!(
                    "{} examples cannot cover {} classes",
                    self.num_examples, self.num_classes
                ),
            ));
        }
        if !(0.0..1.0).contains(&self.noise_rate) {
            return Err(EstimationError::invalid(
                "noise_rate",
                format!("{} is outside [0, 1)", self.noise_rate),
            ));
        }
        if !(self.concentration.is_finite() && self.concentration > 0.0) {
            return Err(EstimationError::invalid("concentration", "must be positive"));
        }
        if !(self.signal.is_finite() && self.signal >= 0.0) {
            return Err(EstimationError::invalid("signal", "must be non-negative"));
        }
        Ok(())
    }
}

/// A generated dataset with known label errors.
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub true_labels: LabelSet,
    pub noisy_labels: LabelSet,
    pub pred_probs: ProbabilityMatrix,
}

impl SyntheticDataset {
    /// Indices whose noisy label differs from the true label.
    pub fn flipped_indices(&self) -> Vec<usize> {
        self.true_labels
            .iter()
            .zip(self.noisy_labels.iter())
            .enumerate()
            .filter(|(_, (t, n))| t != n)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Noise matrix keeping `1 - noise_rate` of each class and spreading the
/// rest evenly over the other classes.
pub fn uniform_noise_matrix(
    num_classes: usize,
    noise_rate: f64,
) -> std::result::Result<Array2<f64>, EstimationError> {
    if num_classes < 2 {
        return Err(EstimationError::invalid("num_classes", "at least 2 classes required"));
    }
    if !(0.0..=1.0).contains(&noise_rate) {
        return Err(EstimationError::invalid(
            "noise_rate",
            format!("{} is outside [0, 1]", noise_rate),
        ));
    }
    let off_diagonal = noise_rate / (num_classes - 1) as f64;
    Ok(Array2::from_shape_fn((num_classes, num_classes), |(i, j)| {
        if i == j {
            1.0 - noise_rate
        } else {
            off_diagonal
        }
    }))
}

/// Flips labels according to `noise_matrix`.
///
/// For each true class `j` with `n_j` examples, exactly
/// `round(n_j * (1 - P[j][j]))` randomly chosen examples are relabelled, and
/// those flips are split across the other classes in proportion to column
/// `j` of the matrix.
///
/// # Errors
///
/// `InputError::ClassCountMismatch` for a matrix of the wrong size and
/// `EstimationError::InvalidParameter` when it is not column-stochastic.
pub fn generate_noisy_labels<R: Rng + ?Sized>(
    true_labels: &LabelSet,
    noise_matrix: &Array2<f64>,
    rng: &mut R,
) -> Result<LabelSet> {
    let k = true_labels.num_classes();
    if noise_matrix.nrows() != k || noise_matrix.ncols() != k {
        return Err(InputError::ClassCountMismatch {
            labels: k,
            probs: noise_matrix.nrows().max(noise_matrix.ncols()),
        }
        .into());
    }
    validate_noise_matrix(noise_matrix)?;

    let mut noisy = true_labels.as_slice().to_vec();
    for true_class in 0..k {
        let mut members = true_labels.indices_of(true_class);
        if members.is_empty() {
            continue;
        }
        members.shuffle(rng);

        let n = members.len() as f64;
        let keep = noise_matrix[[true_class, true_class]];
        let num_flips = (n * (1.0 - keep)).round() as usize;
        if num_flips == 0 {
            continue;
        }

        let off_total = 1.0 - keep;
        let targets = Array2::from_shape_fn((1, k), |(_, given)| {
            if given == true_class {
                0.0
            } else {
                noise_matrix[[given, true_class]] / off_total * num_flips as f64
            }
        });
        let flips = round_preserving_row_totals(&targets, &[num_flips]);

        let mut cursor = members.into_iter();
        for (given, &count) in flips.row(0).iter().enumerate() {
            for index in cursor.by_ref().take(count) {
                noisy[index] = given;
            }
        }
    }

    Ok(LabelSet::new(noisy, k)?)
}

/// Generates a dataset per `config`.
///
/// True labels are balanced (`i mod K`, shuffled). Each probability row is
/// a Dirichlet draw with concentration `concentration + signal` on the true
/// class and `concentration` elsewhere.
pub fn generate(config: &SyntheticConfig) -> Result<SyntheticDataset> {
    config.validate()?;
    let mut rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_rng(&mut rand::rng()),
    };

    let k = config.num_classes;
    let mut labels: Vec<usize> = (0..config.num_examples).map(|i| i % k).collect();
    labels.shuffle(&mut rng);
    let true_labels = LabelSet::new(labels, k)?;

    let noise_matrix = uniform_noise_matrix(k, config.noise_rate)?;
    let noisy_labels = generate_noisy_labels(&true_labels, &noise_matrix, &mut rng)?;

    let base = gamma(config.concentration)?;
    let boosted = gamma(config.concentration + config.signal)?;
    let mut probs = Array2::zeros((config.num_examples, k));
    for (mut row, true_class) in probs.rows_mut().into_iter().zip(true_labels.iter()) {
        let draws: Array1<f64> = (0..k)
            .map(|j| {
                if j == true_class {
                    boosted.sample(&mut rng)
                } else {
                    base.sample(&mut rng)
                }
            })
            .collect();
        let total = draws.sum();
        if total > 0.0 {
            row.assign(&(draws / total));
        } else {
            row[true_class] = 1.0;
        }
    }

    let dataset = SyntheticDataset {
        true_labels,
        noisy_labels,
        pred_probs: ProbabilityMatrix::new(probs)?,
    };
    debug!(
        examples = config.num_examples,
        classes = k,
        flipped = dataset.flipped_indices().len(),
        "Generated synthetic dataset"
    );
    Ok(dataset)
}

fn gamma(shape: f64) -> std::result::Result<Gamma<f64>, EstimationError> {
    Gamma::new(shape, 1.0).map_err(|e| EstimationError::invalid("concentration", e.to_string()))
}

fn validate_noise_matrix(matrix: &Array2<f64>) -> std::result::Result<(), EstimationError> {
    if matrix.iter().any(|&p| !(0.0..=1.0).contains(&p)) {
        return Err(EstimationError::invalid(
            "noise_matrix",
            "entries must lie in [0, 1]",
        ));
    }
    for (j, column) in matrix.columns().into_iter().enumerate() {
        let sum = column.sum();
        if (sum - 1.0).abs() > COLUMN_SUM_TOLERANCE {
            return Err(EstimationError::invalid(
                "noise_matrix",
                format!("column {} sums to {}", j, sum),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_noise_matrix_is_column_stochastic() {
        let matrix = uniform_noise_matrix(4, 0.3).expect("matrix");
        for column in matrix.columns() {
            assert!((column.sum() - 1.0).abs() < 1e-12);
        }
        assert!((matrix[[0, 0]] - 0.7).abs() < 1e-12);
        assert!((matrix[[1, 0]] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_noisy_labels_flip_exact_counts() {
        let labels: Vec<usize> = (0..300).map(|i| i % 3).collect();
        let true_labels = LabelSet::new(labels, 3).expect("labels");
        let matrix = uniform_noise_matrix(3, 0.2).expect("matrix");
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let noisy = generate_noisy_labels(&true_labels, &matrix, &mut rng).expect("noisy");

        for class in 0..3 {
            let flipped = true_labels
                .iter()
                .zip(noisy.iter())
                .filter(|&(t, n)| t == class && n != class)
                .count();
            assert_eq!(flipped, 20, "class {class}");
        }
    }

    #[test]
    fn test_rejects_non_stochastic_matrix() {
        let true_labels = LabelSet::new(vec![0, 1], 2).expect("labels");
        let matrix = Array2::from_elem((2, 2), 0.7);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(generate_noisy_labels(&true_labels, &matrix, &mut rng).is_err());
    }

    #[test]
    fn test_generate_is_reproducible() {
        let config = SyntheticConfig {
            num_examples: 60,
            seed: Some(42),
            ..SyntheticConfig::default()
        };
        let a = generate(&config).expect("first");
        let b = generate(&config).expect("second");
        assert_eq!(a.noisy_labels, b.noisy_labels);
        assert_eq!(a.pred_probs.view(), b.pred_probs.view());
        assert_eq!(a.flipped_indices().len(), 6);
    }

    #[test]
    fn test_zero_noise_keeps_labels() {
        let config = SyntheticConfig {
            num_examples: 30,
            noise_rate: 0.0,
            seed: Some(3),
            ..SyntheticConfig::default()
        };
        let dataset = generate(&config).expect("dataset");
        assert!(dataset.flipped_indices().is_empty());
    }

    #[test]
    fn test_config_validation() {
        let config = SyntheticConfig {
            num_classes: 1,
            ..SyntheticConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
