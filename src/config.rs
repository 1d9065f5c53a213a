//! Audit configuration.
//!
//! Settings are read from an optional YAML file, then overridden by
//! `AUDIT_*` environment variables, then validated. Sections mirror the
//! three analyses: `labels`, `sequences` and `outliers`.
//!
//! ```yaml
//! labels:
//!   method: self_confidence
//!   policy: count_based
//!   frac_noise: 1.0
//!   exclude: [[0, 1]]
//! sequences:
//!   aggregation: softmin
//!   temperature: 0.05
//! outliers:
//!   k: 10
//!   metric: cosine
//! ```

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::data::DEFAULT_ROW_SUM_TOLERANCE;
use crate::filter::{ExcludePairs, FilterPolicy, IssueFinder, ScoreThreshold};
use crate::outlier::{DistanceMetric, OodMethod, OutlierParams, DEFAULT_K};
use crate::scoring::ScoringMethod;
use crate::sequence::{SequenceAggregation, DEFAULT_SOFTMIN_TEMPERATURE, DEFAULT_TOKEN_THRESHOLD};

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML for this schema.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Filtering policy name as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    CountBased,
    ScoreBased,
    ConfidentOffDiagonal,
    PredictedNeqGiven,
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "count_based" | "prune_by_noise_rate" => Ok(PolicyKind::CountBased),
            "score_based" => Ok(PolicyKind::ScoreBased),
            "confident_off_diagonal" => Ok(PolicyKind::ConfidentOffDiagonal),
            "predicted_neq_given" => Ok(PolicyKind::PredictedNeqGiven),
            other => Err(format!("unknown filter policy '{}'", other)),
        }
    }
}

/// Sequence aggregation name as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    #[default]
    Min,
    Mean,
    Softmin,
}

impl FromStr for AggregationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "min" => Ok(AggregationKind::Min),
            "mean" => Ok(AggregationKind::Mean),
            "softmin" => Ok(AggregationKind::Softmin),
            other => Err(format!("unknown aggregation '{}'", other)),
        }
    }
}

/// Label issue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    /// Scoring method used to select and threshold candidates.
    pub method: ScoringMethod,
    pub policy: PolicyKind,
    /// Percentile cut-off for the score-based policy.
    pub percentile: f64,
    /// Absolute cut-off for the score-based policy; wins over `percentile`.
    pub threshold: Option<f64>,
    pub frac_noise: f64,
    pub min_examples_per_class: usize,
    /// Unordered class pairs never reported.
    pub exclude: ExcludePairs,
    /// Ranking method; `None` reports a mask.
    pub rank_by: Option<ScoringMethod>,
    pub row_sum_tolerance: f64,
    pub adjust_pred_probs: bool,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            method: ScoringMethod::SelfConfidence,
            policy: PolicyKind::CountBased,
            percentile: 10.0,
            threshold: None,
            frac_noise: 1.0,
            min_examples_per_class: 1,
            exclude: ExcludePairs::new(),
            rank_by: Some(ScoringMethod::SelfConfidence),
            row_sum_tolerance: DEFAULT_ROW_SUM_TOLERANCE,
            adjust_pred_probs: false,
        }
    }
}

/// Sequence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencesConfig {
    pub method: ScoringMethod,
    pub aggregation: AggregationKind,
    /// Softmin temperature.
    pub temperature: f64,
    /// Token scores below this are reported.
    pub token_threshold: f64,
}

impl Default for SequencesConfig {
    fn default() -> Self {
        Self {
            method: ScoringMethod::SelfConfidence,
            aggregation: AggregationKind::Min,
            temperature: DEFAULT_SOFTMIN_TEMPERATURE,
            token_threshold: DEFAULT_TOKEN_THRESHOLD,
        }
    }
}

/// Outlier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutliersConfig {
    pub k: usize,
    /// Distance metric; `None` picks one from the feature dimension.
    pub metric: Option<DistanceMetric>,
    pub t: f64,
    pub ood_method: OodMethod,
}

impl Default for OutliersConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            metric: None,
            t: 1.0,
            ood_method: OodMethod::Entropy,
        }
    }
}

/// Complete audit configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub labels: LabelsConfig,
    pub sequences: SequencesConfig,
    pub outliers: OutliersConfig,
}

impl AuditConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a YAML file (or defaults without one), applies environment
    /// overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        let config = config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a YAML file. Missing keys take their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Applies `AUDIT_*` environment variable overrides.
    ///
    /// # Environment Variables
    ///
    /// - `AUDIT_METHOD`: label scoring method
    /// - `AUDIT_POLICY`: filter policy
    /// - `AUDIT_PERCENTILE`: score-based percentile cut-off
    /// - `AUDIT_THRESHOLD`: score-based absolute cut-off
    /// - `AUDIT_FRAC_NOISE`: fraction of estimated issues flagged
    /// - `AUDIT_MIN_EXAMPLES_PER_CLASS`: examples each class keeps unflagged
    /// - `AUDIT_EXCLUDE`: excluded pairs, e.g. `0:1,2:3`
    /// - `AUDIT_RANK_BY`: ranking method, or `none` for a mask
    /// - `AUDIT_ROW_SUM_TOLERANCE`: probability row-sum tolerance
    /// - `AUDIT_ADJUST_PRED_PROBS`: threshold-adjust probabilities
    /// - `AUDIT_SEQUENCE_METHOD`: token scoring method
    /// - `AUDIT_AGGREGATION`: `min`, `mean` or `softmin`
    /// - `AUDIT_TEMPERATURE`: softmin temperature
    /// - `AUDIT_TOKEN_THRESHOLD`: token issue cut-off
    /// - `AUDIT_OUTLIER_K`: neighbours per point
    /// - `AUDIT_OUTLIER_METRIC`: distance metric, or `auto`
    /// - `AUDIT_OUTLIER_T`: distance-to-score sharpness
    /// - `AUDIT_OOD_METHOD`: prediction-based OOD method
    pub fn apply_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Labels
        if let Some(val) = lookup("AUDIT_METHOD") {
            self.labels.method = parse_env_value(&val, "AUDIT_METHOD")?;
        }
        if let Some(val) = lookup("AUDIT_POLICY") {
            self.labels.policy = parse_env_value(&val, "AUDIT_POLICY")?;
        }
        if let Some(val) = lookup("AUDIT_PERCENTILE") {
            self.labels.percentile = parse_env_value(&val, "AUDIT_PERCENTILE")?;
        }
        if let Some(val) = lookup("AUDIT_THRESHOLD") {
            self.labels.threshold = Some(parse_env_value(&val, "AUDIT_THRESHOLD")?);
        }
        if let Some(val) = lookup("AUDIT_FRAC_NOISE") {
            self.labels.frac_noise = parse_env_value(&val, "AUDIT_FRAC_NOISE")?;
        }
        if let Some(val) = lookup("AUDIT_MIN_EXAMPLES_PER_CLASS") {
            self.labels.min_examples_per_class =
                parse_env_value(&val, "AUDIT_MIN_EXAMPLES_PER_CLASS")?;
        }
        if let Some(val) = lookup("AUDIT_EXCLUDE") {
            self.labels.exclude = parse_exclude(&val, "AUDIT_EXCLUDE")?;
        }
        if let Some(val) = lookup("AUDIT_RANK_BY") {
            self.labels.rank_by = if val.trim().eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse_env_value(&val, "AUDIT_RANK_BY")?)
            };
        }
        if let Some(val) = lookup("AUDIT_ROW_SUM_TOLERANCE") {
            self.labels.row_sum_tolerance = parse_env_value(&val, "AUDIT_ROW_SUM_TOLERANCE")?;
        }
        if let Some(val) = lookup("AUDIT_ADJUST_PRED_PROBS") {
            self.labels.adjust_pred_probs = parse_env_bool(&val, "AUDIT_ADJUST_PRED_PROBS")?;
        }

        // Sequences
        if let Some(val) = lookup("AUDIT_SEQUENCE_METHOD") {
            self.sequences.method = parse_env_value(&val, "AUDIT_SEQUENCE_METHOD")?;
        }
        if let Some(val) = lookup("AUDIT_AGGREGATION") {
            self.sequences.aggregation = parse_env_value(&val, "AUDIT_AGGREGATION")?;
        }
        if let Some(val) = lookup("AUDIT_TEMPERATURE") {
            self.sequences.temperature = parse_env_value(&val, "AUDIT_TEMPERATURE")?;
        }
        if let Some(val) = lookup("AUDIT_TOKEN_THRESHOLD") {
            self.sequences.token_threshold = parse_env_value(&val, "AUDIT_TOKEN_THRESHOLD")?;
        }

        // Outliers
        if let Some(val) = lookup("AUDIT_OUTLIER_K") {
            self.outliers.k = parse_env_value(&val, "AUDIT_OUTLIER_K")?;
        }
        if let Some(val) = lookup("AUDIT_OUTLIER_METRIC") {
            self.outliers.metric = if val.trim().eq_ignore_ascii_case("auto") {
                None
            } else {
                Some(parse_env_value(&val, "AUDIT_OUTLIER_METRIC")?)
            };
        }
        if let Some(val) = lookup("AUDIT_OUTLIER_T") {
            self.outliers.t = parse_env_value(&val, "AUDIT_OUTLIER_T")?;
        }
        if let Some(val) = lookup("AUDIT_OOD_METHOD") {
            self.outliers.ood_method = parse_env_value(&val, "AUDIT_OOD_METHOD")?;
        }

        Ok(self)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.labels.percentile) {
            return Err(ConfigError::ValidationFailed(
                "labels.percentile must be between 0 and 100".to_string(),
            ));
        }

        if self.labels.threshold.is_some_and(|t| !t.is_finite()) {
            return Err(ConfigError::ValidationFailed(
                "labels.threshold must be finite".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.labels.frac_noise) {
            return Err(ConfigError::ValidationFailed(
                "labels.frac_noise must be between 0.0 and 1.0".to_string(),
            ));
        }

        if !(self.labels.row_sum_tolerance.is_finite() && self.labels.row_sum_tolerance > 0.0) {
            return Err(ConfigError::ValidationFailed(
                "labels.row_sum_tolerance must be positive".to_string(),
            ));
        }

        if self.sequences.temperature.is_nan() || self.sequences.temperature < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "sequences.temperature cannot be negative".to_string(),
            ));
        }

        if self.outliers.k == 0 {
            return Err(ConfigError::ValidationFailed(
                "outliers.k must be greater than 0".to_string(),
            ));
        }

        if !(self.outliers.t.is_finite() && self.outliers.t > 0.0) {
            return Err(ConfigError::ValidationFailed(
                "outliers.t must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// The configured filtering policy.
    pub fn filter_policy(&self) -> FilterPolicy {
        match self.labels.policy {
            PolicyKind::CountBased => FilterPolicy::CountBased,
            PolicyKind::ScoreBased => FilterPolicy::ScoreBased {
                threshold: match self.labels.threshold {
                    Some(value) => ScoreThreshold::Absolute(value),
                    None => ScoreThreshold::Percentile(self.labels.percentile),
                },
            },
            PolicyKind::ConfidentOffDiagonal => FilterPolicy::ConfidentOffDiagonal,
            PolicyKind::PredictedNeqGiven => FilterPolicy::PredictedNeqGiven,
        }
    }

    /// Builds the label issue finder.
    pub fn issue_finder(&self) -> Result<IssueFinder, ConfigError> {
        let mut builder = IssueFinder::builder()
            .method(self.labels.method)
            .adjust_pred_probs(self.labels.adjust_pred_probs)
            .policy(self.filter_policy())
            .exclude(self.labels.exclude.clone())
            .frac_noise(self.labels.frac_noise)
            .min_examples_per_class(self.labels.min_examples_per_class);
        if let Some(method) = self.labels.rank_by {
            builder = builder.rank_by(method);
        }
        builder
            .build()
            .map_err(|e| ConfigError::ValidationFailed(e.to_string()))
    }

    /// The configured sequence aggregation.
    pub fn aggregation(&self) -> SequenceAggregation {
        match self.sequences.aggregation {
            AggregationKind::Min => SequenceAggregation::Min,
            AggregationKind::Mean => SequenceAggregation::Mean,
            AggregationKind::Softmin => SequenceAggregation::Softmin {
                temperature: self.sequences.temperature,
            },
        }
    }

    /// The configured outlier parameters.
    pub fn outlier_params(&self) -> OutlierParams {
        OutlierParams {
            k: Some(self.outliers.k),
            metric: self.outliers.metric,
            t: self.outliers.t,
        }
    }
}

/// Parse an environment variable value.
fn parse_env_value<T: FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

/// Parse `a:b,c:d` into unordered class pairs.
fn parse_exclude(value: &str, key: &str) -> Result<ExcludePairs, ConfigError> {
    let mut exclude = ExcludePairs::new();
    for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (a, b) = pair.split_once(':').ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected 'a:b', got '{}'", pair),
        })?;
        exclude.insert(parse_env_value(a, key)?, parse_env_value(b, key)?);
    }
    Ok(exclude)
}
