//! label-audit: label quality auditing for classification datasets.
//!
//! Finds likely label errors from out-of-sample predicted probabilities
//! using confident learning, extends the same scores to token-labelled
//! sequences, and scores how atypical examples are from their feature
//! embeddings.

// Core modules
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod filter;
pub mod joint;
pub mod outlier;
pub mod scoring;
pub mod sequence;
pub mod synthetic;

// Re-export commonly used types
pub use config::{AuditConfig, ConfigError};
pub use data::{LabelSet, ProbabilityMatrix, SequenceDataset};
pub use error::{AuditError, EstimationError, InputError, OutlierError, Result};
pub use filter::{find_label_issues, ExcludePairs, FilterPolicy, IssueFinder, LabelIssues};
pub use outlier::{outlier_scores, DistanceMetric, NeighborIndex, OutlierParams};
pub use scoring::{label_quality_scores, ScoringMethod};
pub use sequence::{sequence_quality_scores, SequenceAggregation};
