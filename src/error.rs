//! Error types for label-audit operations.
//!
//! Defines the error taxonomy shared by every subsystem:
//! - Input shape and validation failures
//! - Degenerate statistics during joint estimation and scoring
//! - Nearest-neighbor index construction and queries
//!
//! Every error is local to a single call; operations either succeed
//! completely or fail without a partial result.

use thiserror::Error;

/// Errors raised while validating labels, probabilities, sequences or features.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("Input is empty: {0}")]
    Empty(String),

    #[error("Length mismatch: {labels} labels but {rows} probability rows")]
    LengthMismatch { labels: usize, rows: usize },

    #[error("Row {row} has {found} columns, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Class count mismatch: labels declare {labels} classes, probabilities have {probs} columns")]
    ClassCountMismatch { labels: usize, probs: usize },

    #[error("Label {label} at index {index} is outside [0, {num_classes})")]
    LabelOutOfRange {
        index: usize,
        label: usize,
        num_classes: usize,
    },

    #[error("Probability at ({row}, {col}) is invalid: {value}")]
    InvalidProbability { row: usize, col: usize, value: f64 },

    #[error("Row {row} sums to {sum}, outside tolerance {tolerance} of 1.0")]
    RowSumOutOfTolerance { row: usize, sum: f64, tolerance: f64 },

    #[error("Sequence {0} is empty")]
    EmptySequence(usize),

    #[error("Sequence {sequence} has {labels} labels but {rows} probability rows")]
    SequenceLengthMismatch {
        sequence: usize,
        labels: usize,
        rows: usize,
    },

    #[error("Feature at ({row}, {col}) is not finite: {value}")]
    NonFiniteFeature { row: usize, col: usize, value: f64 },

    #[error("Feature dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Errors raised when the supplied data cannot support an estimate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EstimationError {
    #[error("Threshold for class {class} is undefined: no examples carry that given label")]
    UndefinedThreshold { class: usize },

    #[error("Confident joint row for class {class} is empty; calibration is undefined")]
    EmptyConfidentRow { class: usize },

    #[error("Confident joint has {joint} classes but labels declare {labels}")]
    ClassCountMismatch { joint: usize, labels: usize },

    #[error("Confident joint was estimated from {joint} examples but {labels} labels were supplied")]
    ExampleCountMismatch { joint: usize, labels: usize },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
}

impl EstimationError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while fitting or querying a nearest-neighbor index.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OutlierError {
    #[error("Cannot fit index with {points} reference points for k = {k}: need more than k")]
    TooFewReferencePoints { points: usize, k: usize },

    #[error("Number of neighbors k must be at least 1")]
    InvalidNeighborCount,

    #[error("Query dimension {found} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Invalid outlier parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Input(#[from] InputError),
}

/// Umbrella error for entry points that span several subsystems.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuditError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Estimation(#[from] EstimationError),

    #[error(transparent)]
    Outlier(#[from] OutlierError),
}

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, AuditError>;
