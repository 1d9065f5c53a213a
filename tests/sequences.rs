//! Sequence scoring and token issue mapping.

use label_audit::filter::{ExcludePairs, FilterPolicy, IssueFinder};
use label_audit::scoring::ScoringMethod;
use label_audit::sequence::{
    find_sequence_label_issues, sequence_issues_from_scores, sequence_quality_scores,
    SequenceAggregation, TokenIssue,
};
use label_audit::{InputError, SequenceDataset};
use ndarray::array;

fn single_sequence() -> SequenceDataset {
    // Token scores under self-confidence: [0.9, 0.1].
    SequenceDataset::new(vec![vec![0, 0]], vec![array![[0.9, 0.1], [0.1, 0.9]]])
        .expect("dataset")
}

fn score_with(aggregation: SequenceAggregation) -> f64 {
    sequence_quality_scores(
        &single_sequence(),
        ScoringMethod::SelfConfidence,
        aggregation,
    )
    .expect("scores")
    .sequence_scores()[0]
}

#[test]
fn test_aggregations_of_two_tokens() {
    assert!((score_with(SequenceAggregation::Min) - 0.1).abs() < 1e-12);
    assert!((score_with(SequenceAggregation::Mean) - 0.5).abs() < 1e-12);

    let cold = score_with(SequenceAggregation::Softmin { temperature: 1e-3 });
    let hot = score_with(SequenceAggregation::Softmin { temperature: 1e9 });
    assert!((cold - 0.1).abs() < 1e-9, "cold {cold}");
    assert!((hot - 0.5).abs() < 1e-6, "hot {hot}");

    let default_softmin = score_with(SequenceAggregation::softmin());
    assert!(default_softmin > 0.1 && default_softmin < 0.5);
}

#[test]
fn test_token_issues_map_to_sequence_positions() {
    let dataset = SequenceDataset::new(
        vec![vec![0, 1, 1], vec![1], vec![0, 0]],
        vec![
            array![[0.8, 0.2], [0.3, 0.7], [0.95, 0.05]],
            array![[0.02, 0.98]],
            array![[0.92, 0.08], [0.6, 0.4]],
        ],
    )
    .expect("dataset");
    let scores = sequence_quality_scores(
        &dataset,
        ScoringMethod::SelfConfidence,
        SequenceAggregation::Min,
    )
    .expect("scores");

    assert_eq!(scores.ranked_sequences(), vec![0, 2, 1]);

    let issues = sequence_issues_from_scores(&scores, 0.5, &ExcludePairs::new());
    assert_eq!(
        issues,
        vec![TokenIssue {
            sequence: 0,
            position: 2
        }]
    );

    let everything = sequence_issues_from_scores(&scores, 1.0, &ExcludePairs::new());
    assert_eq!(everything.len(), 6);
    assert_eq!(
        everything[1],
        TokenIssue {
            sequence: 2,
            position: 1
        }
    );

    let finder = IssueFinder::new(ScoringMethod::SelfConfidence, FilterPolicy::PredictedNeqGiven);
    let found = find_sequence_label_issues(&dataset, &finder).expect("issues");
    assert_eq!(
        found,
        vec![TokenIssue {
            sequence: 0,
            position: 2
        }]
    );
}

#[test]
fn test_sequence_ties_rank_by_index() {
    let dataset = SequenceDataset::new(
        vec![vec![0], vec![0], vec![1]],
        vec![
            array![[0.5, 0.5]],
            array![[0.5, 0.5]],
            array![[0.5, 0.5]],
        ],
    )
    .expect("dataset");
    let scores = sequence_quality_scores(
        &dataset,
        ScoringMethod::SelfConfidence,
        SequenceAggregation::Mean,
    )
    .expect("scores");
    assert_eq!(scores.ranked_sequences(), vec![0, 1, 2]);
}

#[test]
fn test_empty_sequence_is_rejected() {
    let result = SequenceDataset::new(
        vec![vec![0], vec![]],
        vec![array![[1.0, 0.0]], ndarray::Array2::zeros((0, 2))],
    );
    assert!(matches!(result, Err(InputError::EmptySequence(1))));
}

#[test]
fn test_negative_temperature_is_rejected() {
    let result = sequence_quality_scores(
        &single_sequence(),
        ScoringMethod::SelfConfidence,
        SequenceAggregation::Softmin { temperature: -1.0 },
    );
    assert!(result.is_err());
}
