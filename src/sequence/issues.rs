//! Token-level label issues mapped back to sequence positions.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{SequenceDataset, SequenceLayout};
use crate::error::Result;
use crate::filter::{ExcludePairs, IssueFinder};

use super::scores::SequenceScores;

/// Token scores below this are reported as issues by default.
pub const DEFAULT_TOKEN_THRESHOLD: f64 = 0.1;

/// A suspicious token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenIssue {
    pub sequence: usize,
    pub position: usize,
}

/// Tokens scoring strictly below `threshold`, lowest score first with ties
/// by flat index. Tokens whose `(given, predicted)` pair is excluded are
/// dropped.
pub fn sequence_issues_from_scores(
    scores: &SequenceScores,
    threshold: f64,
    exclude: &ExcludePairs,
) -> Vec<TokenIssue> {
    let token_scores = scores.token_scores();
    let mut flagged: Vec<usize> = (0..token_scores.len())
        .filter(|&i| token_scores[i] < threshold)
        .filter(|&i| {
            let (given, predicted) = scores.token_classes()[i];
            !exclude.contains(given, predicted)
        })
        .collect();
    flagged.sort_by_key(|&i| (OrderedFloat(token_scores[i]), i));

    debug!(threshold, flagged = flagged.len(), "Found token issues");
    to_token_issues(scores.layout(), &flagged)
}

/// Runs `finder` over all tokens as one flat dataset and maps the flagged
/// tokens to their sequence positions.
///
/// Positions come back in the finder's order: ranked when it ranks, flat
/// index order otherwise.
pub fn find_sequence_label_issues(
    dataset: &SequenceDataset,
    finder: &IssueFinder,
) -> Result<Vec<TokenIssue>> {
    let issues = finder.find(dataset.labels(), dataset.probs())?;
    Ok(to_token_issues(dataset.layout(), &issues.indices()))
}

fn to_token_issues(layout: &SequenceLayout, flat: &[usize]) -> Vec<TokenIssue> {
    flat.iter()
        .filter_map(|&i| layout.flat_to_pair(i))
        .map(|(sequence, position)| TokenIssue { sequence, position })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterPolicy;
    use crate::scoring::ScoringMethod;
    use crate::sequence::{sequence_quality_scores, SequenceAggregation};
    use ndarray::array;

    fn dataset() -> SequenceDataset {
        SequenceDataset::new(
            vec![vec![0, 0, 1], vec![1, 0]],
            vec![
                array![[0.9, 0.1], [0.95, 0.05], [0.92, 0.08]],
                array![[0.05, 0.95], [0.97, 0.03]],
            ],
        )
        .expect("dataset")
    }

    fn scores() -> SequenceScores {
        sequence_quality_scores(
            &dataset(),
            ScoringMethod::SelfConfidence,
            SequenceAggregation::Min,
        )
        .expect("scores")
    }

    #[test]
    fn test_low_tokens_map_to_positions() {
        let issues = sequence_issues_from_scores(
            &scores(),
            DEFAULT_TOKEN_THRESHOLD,
            &ExcludePairs::new(),
        );
        assert_eq!(
            issues,
            vec![TokenIssue {
                sequence: 0,
                position: 2
            }]
        );
    }

    #[test]
    fn test_issues_ranked_by_score() {
        let issues = sequence_issues_from_scores(&scores(), 1.0, &ExcludePairs::new());
        assert_eq!(issues.len(), 5);
        assert_eq!(
            issues[0],
            TokenIssue {
                sequence: 0,
                position: 2
            }
        );
        assert_eq!(
            issues[4],
            TokenIssue {
                sequence: 1,
                position: 1
            }
        );
    }

    #[test]
    fn test_excluded_pairs_are_dropped() {
        let exclude = ExcludePairs::new().with_pair(0, 1);
        let issues = sequence_issues_from_scores(&scores(), DEFAULT_TOKEN_THRESHOLD, &exclude);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_find_sequence_label_issues_maps_back() {
        let finder = IssueFinder::new(ScoringMethod::SelfConfidence, FilterPolicy::PredictedNeqGiven);
        let issues = find_sequence_label_issues(&dataset(), &finder).expect("issues");
        assert_eq!(
            issues,
            vec![TokenIssue {
                sequence: 0,
                position: 2
            }]
        );
    }
}
