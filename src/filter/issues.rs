//! Label issue detection.
//!
//! Combines the calibrated joint and per-example quality scores under a
//! selectable [`FilterPolicy`] to flag likely label errors.

use ndarray::Array2;
use ordered_float::OrderedFloat;
use tracing::debug;

use crate::data::{check_aligned, LabelSet, ProbabilityMatrix};
use crate::error::{EstimationError, Result};
use crate::joint::{calibrate_joint, estimate_confident_joint, ConfidentJoint};
use crate::scoring::{label_quality_scores, ScoringMethod, ScoringOptions};

use super::exclude::ExcludePairs;
use super::policy::{mask_to_indices, rank_by_score, FilterPolicy, LabelIssues};

/// Default fraction of the estimated issue count that is flagged.
const DEFAULT_FRAC_NOISE: f64 = 1.0;

/// Default number of examples each given class keeps unflagged.
const DEFAULT_MIN_EXAMPLES_PER_CLASS: usize = 1;

/// Configured label issue finder.
///
/// Holds the scoring method used to pick candidates, the filtering policy,
/// the excluded class pairs and the optional ranking method.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueFinder {
    scoring: ScoringOptions,
    policy: FilterPolicy,
    exclude: ExcludePairs,
    rank_by: Option<ScoringMethod>,
    frac_noise: f64,
    min_examples_per_class: usize,
}

impl Default for IssueFinder {
    fn default() -> Self {
        Self {
            scoring: ScoringOptions::default(),
            policy: FilterPolicy::default(),
            exclude: ExcludePairs::default(),
            rank_by: None,
            frac_noise: DEFAULT_FRAC_NOISE,
            min_examples_per_class: DEFAULT_MIN_EXAMPLES_PER_CLASS,
        }
    }
}

impl IssueFinder {
    /// Creates a finder with the given scoring method and policy.
    pub fn new(method: ScoringMethod, policy: FilterPolicy) -> Self {
        Self {
            scoring: ScoringOptions::new(method),
            policy,
            ..Self::default()
        }
    }

    /// Creates a builder for configuring the finder.
    pub fn builder() -> IssueFinderBuilder {
        IssueFinderBuilder::default()
    }

    pub fn policy(&self) -> FilterPolicy {
        self.policy
    }

    pub fn scoring(&self) -> ScoringOptions {
        self.scoring
    }

    pub fn exclude(&self) -> &ExcludePairs {
        &self.exclude
    }

    pub fn rank_by(&self) -> Option<ScoringMethod> {
        self.rank_by
    }

    /// Finds label issues.
    ///
    /// Returns a mask when no ranking method is configured, otherwise the
    /// flagged indices ordered by ascending ranking score (ties by index).
    /// Examples whose predicted class equals their given label are never
    /// flagged, nor are examples whose (given, estimated true) class pair
    /// is excluded.
    ///
    /// # Errors
    ///
    /// Input alignment errors, undefined class thresholds for joint-based
    /// policies, and invalid policy parameters.
    pub fn find(&self, labels: &LabelSet, probs: &ProbabilityMatrix) -> Result<LabelIssues> {
        check_aligned(labels, probs)?;
        let scores = label_quality_scores(labels, probs, &self.scoring)?;
        let predicted = probs.argmax();

        let mut mask = match self.policy {
            FilterPolicy::CountBased => {
                let cj = estimate_confident_joint(labels, probs)?;
                self.count_based_mask(labels, &cj, &scores)?
            }
            FilterPolicy::ConfidentOffDiagonal => {
                let cj = estimate_confident_joint(labels, probs)?;
                labels
                    .iter()
                    .zip(cj.assignments())
                    .map(|(given, assigned)| match assigned {
                        Some(t) => *t != given && !self.exclude.contains(given, *t),
                        None => false,
                    })
                    .collect()
            }
            FilterPolicy::ScoreBased { threshold } => {
                let cutoff = threshold.resolve(&scores)?;
                labels
                    .iter()
                    .zip(&predicted)
                    .zip(&scores)
                    .map(|((given, &pred), &score)| {
                        score < cutoff && !self.exclude.contains(given, pred)
                    })
                    .collect()
            }
            FilterPolicy::PredictedNeqGiven => labels
                .iter()
                .zip(&predicted)
                .map(|(given, &pred)| pred != given && !self.exclude.contains(given, pred))
                .collect(),
        };

        for ((flag, given), &pred) in mask.iter_mut().zip(labels.iter()).zip(&predicted) {
            if pred == given {
                *flag = false;
            }
        }

        let flagged = mask.iter().filter(|&&f| f).count();
        debug!(
            policy = %self.policy,
            method = %self.scoring.method,
            flagged,
            examples = labels.len(),
            "Found label issues"
        );

        match self.rank_by {
            None => Ok(LabelIssues::Mask(mask)),
            Some(method) => {
                let rank_scores = if method == self.scoring.method {
                    scores
                } else {
                    let options = ScoringOptions {
                        method,
                        ..self.scoring
                    };
                    label_quality_scores(labels, probs, &options)?
                };
                Ok(LabelIssues::Ranked(rank_by_score(
                    &mask_to_indices(&mask),
                    &rank_scores,
                )))
            }
        }
    }

    /// Flags, per off-diagonal (given, true) pair, the estimated number of
    /// issues among examples confidently assigned to that true class.
    fn count_based_mask(
        &self,
        labels: &LabelSet,
        cj: &ConfidentJoint,
        scores: &[f64],
    ) -> Result<Vec<bool>> {
        let calibrated = calibrate_joint(cj, labels)?;
        let prune = self.prune_counts(&calibrated.issue_counts(), labels.class_counts());

        let k = labels.num_classes();
        let mut candidates: Vec<Vec<Vec<usize>>> = vec![vec![Vec::new(); k]; k];
        for (i, (given, assigned)) in labels.iter().zip(cj.assignments()).enumerate() {
            if let Some(t) = assigned {
                if *t != given {
                    candidates[given][*t].push(i);
                }
            }
        }

        let mut mask = vec![false; labels.len()];
        for (given, row) in candidates.iter_mut().enumerate() {
            for (true_class, members) in row.iter_mut().enumerate() {
                let quota = prune[[given, true_class]];
                if quota == 0 || members.is_empty() {
                    continue;
                }
                members.sort_by_key(|&i| (OrderedFloat(scores[i]), i));
                for &i in members.iter().take(quota) {
                    mask[i] = true;
                }
            }
        }
        Ok(mask)
    }

    /// Scales issue counts by `frac_noise`, drops excluded pairs and caps
    /// each row so `min_examples_per_class` examples stay unflagged.
    fn prune_counts(&self, issue_counts: &Array2<usize>, class_counts: &[usize]) -> Array2<usize> {
        let mut prune = issue_counts.mapv(|c| (c as f64 * self.frac_noise).round() as usize);

        for given in 0..prune.nrows() {
            for true_class in 0..prune.ncols() {
                if self.exclude.contains(given, true_class) {
                    prune[[given, true_class]] = 0;
                }
            }

            let allowed = class_counts[given].saturating_sub(self.min_examples_per_class);
            let mut total: usize = prune.row(given).sum();
            while total > allowed {
                // Trim the largest quota first, lowest column on ties.
                let mut largest = 0;
                for j in 1..prune.ncols() {
                    if prune[[given, j]] > prune[[given, largest]] {
                        largest = j;
                    }
                }
                prune[[given, largest]] -= 1;
                total -= 1;
            }
        }
        prune
    }
}

/// Builder for configuring an [`IssueFinder`].
#[derive(Debug, Default)]
pub struct IssueFinderBuilder {
    method: Option<ScoringMethod>,
    adjust_pred_probs: Option<bool>,
    policy: Option<FilterPolicy>,
    exclude: Option<ExcludePairs>,
    rank_by: Option<ScoringMethod>,
    frac_noise: Option<f64>,
    min_examples_per_class: Option<usize>,
}

impl IssueFinderBuilder {
    /// Sets the scoring method used for candidate selection and thresholds.
    pub fn method(mut self, method: ScoringMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Scores threshold-adjusted probabilities.
    pub fn adjust_pred_probs(mut self, adjust: bool) -> Self {
        self.adjust_pred_probs = Some(adjust);
        self
    }

    pub fn policy(mut self, policy: FilterPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn exclude(mut self, exclude: ExcludePairs) -> Self {
        self.exclude = Some(exclude);
        self
    }

    /// Returns ranked indices ordered by this method's scores.
    pub fn rank_by(mut self, method: ScoringMethod) -> Self {
        self.rank_by = Some(method);
        self
    }

    /// Fraction of the estimated issues to flag with the count-based policy.
    pub fn frac_noise(mut self, frac: f64) -> Self {
        self.frac_noise = Some(frac);
        self
    }

    pub fn min_examples_per_class(mut self, min: usize) -> Self {
        self.min_examples_per_class = Some(min);
        self
    }

    /// Builds the finder.
    ///
    /// # Errors
    ///
    /// `EstimationError::InvalidParameter` when `frac_noise` is outside `[0, 1]`.
    pub fn build(self) -> std::result::Result<IssueFinder, EstimationError> {
        let frac_noise = self.frac_noise.unwrap_or(DEFAULT_FRAC_NOISE);
        if !(0.0..=1.0).contains(&frac_noise) {
            return Err(EstimationError::invalid(
                "frac_noise",
                format!("{} is outside [0, 1]", frac_noise),
            ));
        }

        Ok(IssueFinder {
            scoring: ScoringOptions {
                method: self.method.unwrap_or_default(),
                adjust_pred_probs: self.adjust_pred_probs.unwrap_or(false),
            },
            policy: self.policy.unwrap_or_default(),
            exclude: self.exclude.unwrap_or_default(),
            rank_by: self.rank_by,
            frac_noise,
            min_examples_per_class: self
                .min_examples_per_class
                .unwrap_or(DEFAULT_MIN_EXAMPLES_PER_CLASS),
        })
    }
}

/// Finds label issues with the given method, policy, exclusions and ranking.
///
/// See [`IssueFinder::find`].
pub fn find_label_issues(
    labels: &LabelSet,
    probs: &ProbabilityMatrix,
    method: ScoringMethod,
    policy: FilterPolicy,
    exclude: &ExcludePairs,
    rank_by: Option<ScoringMethod>,
) -> Result<LabelIssues> {
    IssueFinder {
        scoring: ScoringOptions::new(method),
        policy,
        exclude: exclude.clone(),
        rank_by,
        ..IssueFinder::default()
    }
    .find(labels, probs)
}
