//! Command-line interface for label-audit.
//!
//! Provides commands for label issue detection, sequence scoring, outlier
//! scoring and synthetic data generation.

mod commands;
mod report;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
pub use report::{
    labels_report, outliers_report, sequences_report, FeaturesInput, JointSummary, LabelsInput,
    LabelsReport, OutliersReport, SequencesInput, SequencesReport, SynthOutput,
};
