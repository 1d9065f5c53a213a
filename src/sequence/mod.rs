//! Sequence (token classification) label quality.
//!
//! Every token is scored like an independent example; token scores are then
//! folded into one score per sequence with a [`SequenceAggregation`].
//!
//! ```rust,ignore
//! use label_audit::sequence::{sequence_issues_from_scores, sequence_quality_scores};
//!
//! let scores = sequence_quality_scores(&dataset, method, SequenceAggregation::Min)?;
//! let worst_first = scores.ranked_sequences();
//! let tokens = sequence_issues_from_scores(&scores, 0.1, &ExcludePairs::new());
//! ```

mod aggregate;
mod issues;
mod scores;

pub use aggregate::{SequenceAggregation, DEFAULT_SOFTMIN_TEMPERATURE};
pub use issues::{
    find_sequence_label_issues, sequence_issues_from_scores, TokenIssue, DEFAULT_TOKEN_THRESHOLD,
};
pub use scores::{sequence_quality_scores, SequenceScores, SequenceSummary};
