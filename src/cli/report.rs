//! JSON input formats and report builders behind the CLI commands.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AuditConfig;
use crate::data::{rows_to_array, LabelSet, ProbabilityMatrix, SequenceDataset};
use crate::error::Result;
use crate::filter::rank_by_score;
use crate::joint::{calibrate_joint, estimate_confident_joint, ClassOverlap};
use crate::outlier::{fit_outlier_index, outlier_scores, prediction_ood_scores};
use crate::scoring::label_quality_scores;
use crate::sequence::{
    sequence_issues_from_scores, sequence_quality_scores, SequenceSummary, TokenIssue,
};
use crate::synthetic::SyntheticDataset;

/// Input of the `labels` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelsInput {
    pub labels: Vec<usize>,
    pub pred_probs: Vec<Vec<f64>>,
    /// Class count; defaults to the probability width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_classes: Option<usize>,
}

impl From<&SyntheticDataset> for LabelsInput {
    fn from(dataset: &SyntheticDataset) -> Self {
        Self {
            labels: dataset.noisy_labels.as_slice().to_vec(),
            pred_probs: to_rows(&dataset.pred_probs.view().to_owned()),
            num_classes: Some(dataset.noisy_labels.num_classes()),
        }
    }
}

/// Confident-joint statistics included in a labels report.
#[derive(Debug, Clone, Serialize)]
pub struct JointSummary {
    pub thresholds: Vec<f64>,
    pub confident_joint: Vec<Vec<usize>>,
    pub unassigned: usize,
    pub estimated_num_issues: usize,
    pub label_health_score: f64,
    pub noise_matrix: Vec<Vec<f64>>,
    pub overlapping_classes: Vec<ClassOverlap>,
}

/// Output of the `labels` command.
#[derive(Debug, Clone, Serialize)]
pub struct LabelsReport {
    pub num_examples: usize,
    pub num_classes: usize,
    pub policy: String,
    pub method: String,
    /// Flagged indices, most suspicious first when ranked.
    pub issues: Vec<usize>,
    pub ranked: bool,
    pub label_quality_scores: Vec<f64>,
    pub ood_scores: Vec<f64>,
    /// Absent when the confident joint cannot be estimated.
    pub joint: Option<JointSummary>,
}

/// Runs label issue detection and gathers the supporting estimates.
pub fn labels_report(input: LabelsInput, config: &AuditConfig) -> anyhow::Result<LabelsReport> {
    let probs =
        ProbabilityMatrix::from_rows_with_tolerance(input.pred_probs, config.labels.row_sum_tolerance)?;
    let num_classes = input.num_classes.unwrap_or(probs.num_classes());
    let labels = LabelSet::new(input.labels, num_classes)?;

    let finder = config.issue_finder()?;
    let issues = finder.find(&labels, &probs)?;
    let scores = label_quality_scores(&labels, &probs, &finder.scoring())?;
    let ood_scores = prediction_ood_scores(&probs, None, config.outliers.ood_method)?;

    let joint = match joint_summary(&labels, &probs) {
        Ok(summary) => Some(summary),
        Err(e) => {
            warn!(error = %e, "Skipping confident joint statistics");
            None
        }
    };

    Ok(LabelsReport {
        num_examples: labels.len(),
        num_classes,
        policy: finder.policy().to_string(),
        method: finder.scoring().method.to_string(),
        ranked: finder.rank_by().is_some(),
        issues: issues.indices(),
        label_quality_scores: scores,
        ood_scores,
        joint,
    })
}

fn joint_summary(labels: &LabelSet, probs: &ProbabilityMatrix) -> Result<JointSummary> {
    let cj = estimate_confident_joint(labels, probs)?;
    let calibrated = calibrate_joint(&cj, labels)?;
    Ok(JointSummary {
        thresholds: cj.thresholds().to_vec(),
        confident_joint: to_rows(cj.counts()),
        unassigned: cj.unassigned_count(),
        estimated_num_issues: calibrated.num_label_issues(),
        label_health_score: calibrated.label_health_score(),
        noise_matrix: to_rows(&calibrated.noise_matrix()),
        overlapping_classes: calibrated.overlapping_classes(),
    })
}

/// Input of the `sequences` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencesInput {
    /// Token labels per sequence.
    pub labels: Vec<Vec<usize>>,
    /// Token probability rows per sequence.
    pub pred_probs: Vec<Vec<Vec<f64>>>,
}

/// Output of the `sequences` command.
#[derive(Debug, Clone, Serialize)]
pub struct SequencesReport {
    pub num_sequences: usize,
    pub num_tokens: usize,
    pub aggregation: String,
    /// Sequences, most suspicious first.
    pub sequences: Vec<SequenceSummary>,
    pub token_issues: Vec<TokenIssue>,
}

/// Scores sequences and lists suspicious tokens.
pub fn sequences_report(
    input: SequencesInput,
    config: &AuditConfig,
) -> anyhow::Result<SequencesReport> {
    let probs = input
        .pred_probs
        .into_iter()
        .enumerate()
        .map(|(s, rows)| rows_to_array(rows, &format!("pred_probs[{}]", s)))
        .collect::<std::result::Result<Vec<Array2<f64>>, _>>()?;
    let dataset =
        SequenceDataset::with_tolerance(input.labels, probs, config.labels.row_sum_tolerance)?;

    let aggregation = config.aggregation();
    let scores = sequence_quality_scores(&dataset, config.sequences.method, aggregation)?;
    let token_issues = sequence_issues_from_scores(
        &scores,
        config.sequences.token_threshold,
        &config.labels.exclude,
    );

    Ok(SequencesReport {
        num_sequences: dataset.num_sequences(),
        num_tokens: dataset.layout().num_tokens(),
        aggregation: aggregation.to_string(),
        sequences: scores.ranked_summaries(),
        token_issues,
    })
}

/// Input of the `outliers` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesInput {
    pub features: Vec<Vec<f64>>,
}

/// Output of the `outliers` command.
#[derive(Debug, Clone, Serialize)]
pub struct OutliersReport {
    pub k: usize,
    pub metric: String,
    pub scaling: f64,
    /// One score per scored row.
    pub scores: Vec<f64>,
    /// Row indices, most atypical first.
    pub ranked: Vec<usize>,
}

/// Scores the reference rows against each other, or the query rows against
/// an index fitted on the reference.
pub fn outliers_report(
    reference: FeaturesInput,
    query: Option<FeaturesInput>,
    config: &AuditConfig,
) -> anyhow::Result<OutliersReport> {
    let reference = rows_to_array(reference.features, "features")?;
    let params = config.outlier_params();

    let (scores, index) = match query {
        Some(query) => {
            let index = fit_outlier_index(reference.view(), params.k(), params.metric)?;
            let query = rows_to_array(query.features, "query features")?;
            let result = outlier_scores(query.view(), Some(&index), &params, false)?;
            (result.scores, index)
        }
        None => {
            let result = outlier_scores(reference.view(), None, &params, true)?;
            let index = result
                .index
                .ok_or_else(|| anyhow::anyhow!("Fitted index was not returned"))?;
            (result.scores, index)
        }
    };

    let all: Vec<usize> = (0..scores.len()).collect();
    Ok(OutliersReport {
        k: index.k(),
        metric: index.metric().to_string(),
        scaling: index.scaling(),
        ranked: rank_by_score(&all, &scores),
        scores,
    })
}

/// Output of the `synth` command: a `labels` input plus the ground truth.
#[derive(Debug, Clone, Serialize)]
pub struct SynthOutput {
    #[serde(flatten)]
    pub input: LabelsInput,
    pub true_labels: Vec<usize>,
    pub flipped: Vec<usize>,
}

impl From<&SyntheticDataset> for SynthOutput {
    fn from(dataset: &SyntheticDataset) -> Self {
        Self {
            input: LabelsInput::from(dataset),
            true_labels: dataset.true_labels.as_slice().to_vec(),
            flipped: dataset.flipped_indices(),
        }
    }
}

fn to_rows<T: Clone>(matrix: &Array2<T>) -> Vec<Vec<T>> {
    matrix.rows().into_iter().map(|row| row.to_vec()).collect()
}
