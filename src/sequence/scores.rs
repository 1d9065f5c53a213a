//! Token and sequence quality scores.

use serde::Serialize;
use tracing::debug;

use crate::data::{SequenceDataset, SequenceLayout};
use crate::error::Result;
use crate::filter::rank_by_score;
use crate::scoring::{label_quality_scores, ScoringMethod, ScoringOptions};

use super::aggregate::SequenceAggregation;

/// Scores of a [`SequenceDataset`]: one per sequence, one per token.
#[derive(Debug, Clone)]
pub struct SequenceScores {
    sequence_scores: Vec<f64>,
    token_scores: Vec<f64>,
    token_classes: Vec<(usize, usize)>,
    layout: SequenceLayout,
}

impl SequenceScores {
    pub fn sequence_scores(&self) -> &[f64] {
        &self.sequence_scores
    }

    /// Flat token scores in dataset order.
    pub fn token_scores(&self) -> &[f64] {
        &self.token_scores
    }

    /// Token scores of one sequence.
    pub fn sequence_token_scores(&self, sequence: usize) -> &[f64] {
        &self.token_scores[self.layout.range(sequence)]
    }

    /// `(given, predicted)` class of every flat token.
    pub fn token_classes(&self) -> &[(usize, usize)] {
        &self.token_classes
    }

    pub fn layout(&self) -> &SequenceLayout {
        &self.layout
    }

    pub fn num_sequences(&self) -> usize {
        self.sequence_scores.len()
    }

    /// Sequence indices ordered by ascending score, ties by index.
    pub fn ranked_sequences(&self) -> Vec<usize> {
        let all: Vec<usize> = (0..self.sequence_scores.len()).collect();
        rank_by_score(&all, &self.sequence_scores)
    }
}

/// Per-sequence view of [`SequenceScores`] used in reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceSummary {
    pub sequence: usize,
    pub score: f64,
    pub token_scores: Vec<f64>,
}

impl SequenceScores {
    /// Summaries of every sequence, most suspicious first.
    pub fn ranked_summaries(&self) -> Vec<SequenceSummary> {
        self.ranked_sequences()
            .into_iter()
            .map(|sequence| SequenceSummary {
                sequence,
                score: self.sequence_scores[sequence],
                token_scores: self.sequence_token_scores(sequence).to_vec(),
            })
            .collect()
    }
}

/// Scores every token with `method` and folds each sequence's token scores
/// with `aggregation`.
///
/// # Errors
///
/// `EstimationError::InvalidParameter` for a negative or NaN softmin
/// temperature.
pub fn sequence_quality_scores(
    dataset: &SequenceDataset,
    method: ScoringMethod,
    aggregation: SequenceAggregation,
) -> Result<SequenceScores> {
    aggregation.validate()?;

    let token_scores =
        label_quality_scores(dataset.labels(), dataset.probs(), &ScoringOptions::new(method))?;
    let token_classes: Vec<(usize, usize)> = dataset
        .labels()
        .iter()
        .zip(dataset.probs().argmax())
        .collect();

    let layout = dataset.layout().clone();
    let sequence_scores: Vec<f64> = (0..layout.num_sequences())
        .map(|s| aggregation.aggregate(&token_scores[layout.range(s)]))
        .collect();

    debug!(
        sequences = layout.num_sequences(),
        tokens = layout.num_tokens(),
        %method,
        %aggregation,
        "Scored sequences"
    );

    Ok(SequenceScores {
        sequence_scores,
        token_scores,
        token_classes,
        layout,
    })
}
