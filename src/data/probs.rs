//! Predicted class-probability matrices.

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::error::InputError;

/// Default tolerance on `|row_sum - 1|`.
pub const DEFAULT_ROW_SUM_TOLERANCE: f64 = 1e-3;

/// N×K matrix of out-of-sample predicted probabilities.
///
/// Rows must be non-negative, finite, and sum to 1 within a tolerance.
/// Rows are never renormalised: a matrix outside tolerance is rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMatrix {
    probs: Array2<f64>,
}

impl ProbabilityMatrix {
    /// Validates `probs` with the default row-sum tolerance.
    pub fn new(probs: Array2<f64>) -> Result<Self, InputError> {
        Self::with_tolerance(probs, DEFAULT_ROW_SUM_TOLERANCE)
    }

    /// Validates `probs` with an explicit row-sum tolerance.
    ///
    /// # Errors
    ///
    /// - `InputError::Empty` if there are no rows or no columns
    /// - `InputError::InvalidProbability` for negative or non-finite entries
    /// - `InputError::RowSumOutOfTolerance` if a row does not sum to ≈1
    pub fn with_tolerance(probs: Array2<f64>, tolerance: f64) -> Result<Self, InputError> {
        if probs.nrows() == 0 || probs.ncols() == 0 {
            return Err(InputError::Empty("pred_probs".to_string()));
        }

        for (row, values) in probs.rows().into_iter().enumerate() {
            check_probability_row(row, values, tolerance)?;
        }

        Ok(Self { probs })
    }

    /// Builds a matrix from nested rows, rejecting ragged input.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, InputError> {
        Self::from_rows_with_tolerance(rows, DEFAULT_ROW_SUM_TOLERANCE)
    }

    pub fn from_rows_with_tolerance(
        rows: Vec<Vec<f64>>,
        tolerance: f64,
    ) -> Result<Self, InputError> {
        let probs = rows_to_array(rows, "pred_probs")?;
        Self::with_tolerance(probs, tolerance)
    }

    /// Number of examples (rows).
    pub fn len(&self) -> usize {
        self.probs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.probs.nrows() == 0
    }

    /// Number of classes (columns).
    pub fn num_classes(&self) -> usize {
        self.probs.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.probs.view()
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.probs.row(index)
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.probs
    }

    /// Predicted class for each row (ties resolved to the lowest index).
    pub fn argmax(&self) -> Vec<usize> {
        self.probs.rows().into_iter().map(argmax_row).collect()
    }
}

/// Checks one probability row: finite, non-negative, summing to 1 within
/// `tolerance`. `row` is only used to locate the error.
pub(crate) fn check_probability_row(
    row: usize,
    values: ArrayView1<'_, f64>,
    tolerance: f64,
) -> Result<(), InputError> {
    let mut sum = 0.0;
    for (col, &value) in values.iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(InputError::InvalidProbability { row, col, value });
        }
        sum += value;
    }
    if (sum - 1.0).abs() > tolerance {
        return Err(InputError::RowSumOutOfTolerance {
            row,
            sum,
            tolerance,
        });
    }
    Ok(())
}

/// Index of the largest entry; ties resolve to the lowest index.
pub fn argmax_row(row: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (j, &value) in row.iter().enumerate() {
        if value > row[best] {
            best = j;
        }
    }
    best
}

/// Converts nested rows into a rectangular array.
pub(crate) fn rows_to_array(rows: Vec<Vec<f64>>, what: &str) -> Result<Array2<f64>, InputError> {
    let nrows = rows.len();
    let ncols = rows
        .first()
        .map(Vec::len)
        .ok_or_else(|| InputError::Empty(what.to_string()))?;

    let mut flat = Vec::with_capacity(nrows * ncols);
    for (row, values) in rows.into_iter().enumerate() {
        if values.len() != ncols {
            return Err(InputError::RaggedRow {
                row,
                expected: ncols,
                found: values.len(),
            });
        }
        flat.extend(values);
    }

    Array2::from_shape_vec((nrows, ncols), flat).map_err(|_| InputError::Empty(what.to_string()))
}
