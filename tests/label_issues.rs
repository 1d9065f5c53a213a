//! End-to-end label issue detection.

use label_audit::filter::{ExcludePairs, FilterPolicy, IssueFinder, LabelIssues, ScoreThreshold};
use label_audit::joint::{calibrate_joint, estimate_confident_joint, estimate_num_label_issues};
use label_audit::scoring::{label_quality_scores, ScoringMethod, ScoringOptions};
use label_audit::synthetic::{generate, SyntheticConfig};
use label_audit::{find_label_issues, LabelSet, ProbabilityMatrix};
use ndarray::Array2;

fn policies() -> Vec<FilterPolicy> {
    vec![
        FilterPolicy::CountBased,
        FilterPolicy::ScoreBased {
            threshold: ScoreThreshold::Percentile(50.0),
        },
        FilterPolicy::ScoreBased {
            threshold: ScoreThreshold::Absolute(0.99),
        },
        FilterPolicy::ConfidentOffDiagonal,
        FilterPolicy::PredictedNeqGiven,
    ]
}

/// 30 examples per class; the true class gets 0.8, the others 0.1.
fn peaked(num_per_class: usize) -> (Vec<usize>, Array2<f64>) {
    let k = 3;
    let true_labels: Vec<usize> = (0..num_per_class * k).map(|i| i / num_per_class).collect();
    let probs = Array2::from_shape_fn((true_labels.len(), k), |(i, j)| {
        if j == true_labels[i] {
            0.8
        } else {
            0.1
        }
    });
    (true_labels, probs)
}

fn planted() -> (LabelSet, ProbabilityMatrix) {
    let labels = LabelSet::new(vec![0, 0, 1, 1, 2, 2], 3).expect("labels");
    let probs = ProbabilityMatrix::from_rows(vec![
        vec![0.9, 0.05, 0.05],
        vec![0.05, 0.9, 0.05],
        vec![0.05, 0.9, 0.05],
        vec![0.05, 0.9, 0.05],
        vec![0.05, 0.05, 0.9],
        vec![0.05, 0.05, 0.9],
    ])
    .expect("probs");
    (labels, probs)
}

#[test]
fn test_labels_matching_predictions_have_no_issues() {
    let dataset = generate(&SyntheticConfig {
        num_examples: 300,
        seed: Some(17),
        ..SyntheticConfig::default()
    })
    .expect("dataset");
    let predicted = dataset.pred_probs.argmax();
    let labels = LabelSet::new(predicted, 3).expect("labels");

    for method in ScoringMethod::ALL {
        for policy in policies() {
            let issues = find_label_issues(
                &labels,
                &dataset.pred_probs,
                method,
                policy,
                &ExcludePairs::new(),
                Some(method),
            )
            .expect("issues");
            assert!(issues.is_empty(), "method {method}, policy {policy}");
        }
    }
}

#[test]
fn test_confident_joint_diagonal_grows_as_noise_shrinks() {
    let (true_labels, probs) = peaked(30);
    let probs = ProbabilityMatrix::new(probs).expect("probs");

    let mut previous = None;
    for flips in [6, 4, 2, 0] {
        let mut given = true_labels.clone();
        for label in given.iter_mut().take(flips) {
            *label = 1;
        }
        let labels = LabelSet::new(given, 3).expect("labels");
        let cj = estimate_confident_joint(&labels, &probs).expect("joint");

        assert_eq!(cj.counts()[[1, 0]], flips);
        if let Some(previous) = previous {
            assert!(cj.diagonal_sum() >= previous);
        }
        previous = Some(cj.diagonal_sum());
    }
    assert_eq!(previous, Some(90));
}

#[test]
fn test_calibrated_rows_match_label_counts() {
    let (mut given, probs) = peaked(30);
    for label in given.iter_mut().take(5) {
        *label = 2;
    }
    let labels = LabelSet::new(given, 3).expect("labels");
    let probs = ProbabilityMatrix::new(probs).expect("probs");
    let calibrated =
        calibrate_joint(&estimate_confident_joint(&labels, &probs).expect("joint"), &labels)
            .expect("calibrated");

    for (class, row) in calibrated.calibrated_counts().rows().into_iter().enumerate() {
        assert_eq!(row.sum(), labels.class_counts()[class]);
    }
    assert!((calibrated.joint().sum() - 1.0).abs() < 1e-9);
    assert_eq!(calibrated.num_label_issues(), 5);
}

#[test]
fn test_self_confidence_is_probability_of_given_label() {
    let (labels, probs) = planted();
    let scores = label_quality_scores(&labels, &probs, &ScoringOptions::default()).expect("scores");
    for (i, score) in scores.iter().enumerate() {
        assert_eq!(*score, probs.row(i)[labels.as_slice()[i]]);
    }
}

#[test]
fn test_planted_error_ranks_first() {
    let (labels, probs) = planted();
    for method in ScoringMethod::ALL {
        let issues = find_label_issues(
            &labels,
            &probs,
            method,
            FilterPolicy::CountBased,
            &ExcludePairs::new(),
            Some(method),
        )
        .expect("issues");
        assert_eq!(issues.indices().first(), Some(&1), "method {method}");
    }
}

#[test]
fn test_excluding_confused_pair_suppresses_planted_error() {
    let (labels, probs) = planted();
    let issues = find_label_issues(
        &labels,
        &probs,
        ScoringMethod::SelfConfidence,
        FilterPolicy::CountBased,
        &ExcludePairs::new().with_pair(0, 1),
        Some(ScoringMethod::SelfConfidence),
    )
    .expect("issues");
    assert_eq!(issues, LabelIssues::Ranked(vec![]));
}

#[test]
fn test_ranking_is_deterministic() {
    let dataset = generate(&SyntheticConfig {
        num_examples: 240,
        noise_rate: 0.2,
        seed: Some(23),
        ..SyntheticConfig::default()
    })
    .expect("dataset");
    let finder = IssueFinder::builder()
        .policy(FilterPolicy::PredictedNeqGiven)
        .rank_by(ScoringMethod::NormalizedMargin)
        .build()
        .expect("finder");

    let first = finder
        .find(&dataset.noisy_labels, &dataset.pred_probs)
        .expect("first");
    let second = finder
        .find(&dataset.noisy_labels, &dataset.pred_probs)
        .expect("second");
    assert_eq!(first, second);
}

#[test]
fn test_synthetic_noise_is_mostly_recovered() {
    let dataset = generate(&SyntheticConfig {
        num_examples: 600,
        noise_rate: 0.1,
        seed: Some(11),
        ..SyntheticConfig::default()
    })
    .expect("dataset");
    let flipped = dataset.flipped_indices();

    let finder = IssueFinder::builder()
        .rank_by(ScoringMethod::SelfConfidence)
        .build()
        .expect("finder");
    let found = finder
        .find(&dataset.noisy_labels, &dataset.pred_probs)
        .expect("issues")
        .indices();

    let hits = found.iter().filter(|i| flipped.contains(i)).count();
    let precision = hits as f64 / found.len().max(1) as f64;
    let recall = hits as f64 / flipped.len() as f64;
    assert!(precision > 0.5, "precision {precision}");
    assert!(recall > 0.5, "recall {recall}");

    let estimated =
        estimate_num_label_issues(&dataset.noisy_labels, &dataset.pred_probs).expect("estimate");
    assert!(
        (flipped.len() / 2..flipped.len() * 2).contains(&estimated),
        "estimated {estimated} for {} flips",
        flipped.len()
    );
}
