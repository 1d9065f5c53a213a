//! CLI command definitions for label-audit.
//!
//! Each analysis is a subcommand reading JSON input and writing a JSON
//! report to stdout or `--output`.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::config::AuditConfig;
use crate::synthetic::{generate, SyntheticConfig};

use super::report::{
    labels_report, outliers_report, sequences_report, FeaturesInput, LabelsInput, SequencesInput,
    SynthOutput,
};

/// Label quality auditing for classification datasets.
#[derive(Parser, Debug)]
#[command(name = "label-audit")]
#[command(about = "Find label errors and outliers from model predictions")]
#[command(version)]
#[command(
    long_about = "label-audit estimates which labels in a dataset are likely wrong, using out-of-sample predicted probabilities, and scores how atypical examples are from their feature embeddings.\n\nExample usage:\n  label-audit labels --input preds.json --output issues.json"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// YAML configuration file.
    #[arg(short, long, global = true, env = "AUDIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the report here instead of stdout.
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Find label issues from labels and predicted probabilities.
    Labels(LabelsArgs),

    /// Score token-labelled sequences and list suspicious tokens.
    #[command(alias = "seq")]
    Sequences(SequencesArgs),

    /// Score how atypical feature vectors are.
    Outliers(OutliersArgs),

    /// Generate a synthetic noisy dataset in the `labels` input format.
    Synth(SynthArgs),
}

#[derive(Parser, Debug)]
pub struct LabelsArgs {
    /// JSON file with `labels` and `pred_probs`.
    #[arg(short, long)]
    pub input: PathBuf,
}

#[derive(Parser, Debug)]
pub struct SequencesArgs {
    /// JSON file with per-sequence `labels` and `pred_probs`.
    #[arg(short, long)]
    pub input: PathBuf,
}

#[derive(Parser, Debug)]
pub struct OutliersArgs {
    /// JSON file with reference `features`.
    #[arg(short, long)]
    pub reference: PathBuf,

    /// JSON file with `features` to score against the reference.
    #[arg(short, long)]
    pub query: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct SynthArgs {
    /// Number of examples.
    #[arg(short = 'n', long, default_value = "1000")]
    pub examples: usize,

    /// Number of classes.
    #[arg(short = 'k', long, default_value = "3")]
    pub classes: usize,

    /// Fraction of each class whose label is flipped.
    #[arg(long, default_value = "0.1")]
    pub noise_rate: f64,

    /// Extra Dirichlet concentration on the true class.
    #[arg(long, default_value = "6.0")]
    pub signal: f64,

    /// Random seed.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Parse command-line arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli())
}

/// Run the CLI with the parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = AuditConfig::load(cli.config.as_deref())?;
    let output = cli.output.as_deref();

    match cli.command {
        Commands::Labels(args) => {
            let input: LabelsInput = read_json(&args.input)?;
            let report = labels_report(input, &config)?;
            info!(
                examples = report.num_examples,
                issues = report.issues.len(),
                policy = %report.policy,
                "Label audit complete"
            );
            write_json(&report, output)
        }
        Commands::Sequences(args) => {
            let input: SequencesInput = read_json(&args.input)?;
            let report = sequences_report(input, &config)?;
            info!(
                sequences = report.num_sequences,
                token_issues = report.token_issues.len(),
                "Sequence audit complete"
            );
            write_json(&report, output)
        }
        Commands::Outliers(args) => {
            let reference: FeaturesInput = read_json(&args.reference)?;
            let query = args
                .query
                .as_deref()
                .map(read_json::<FeaturesInput>)
                .transpose()?;
            let report = outliers_report(reference, query, &config)?;
            info!(
                points = report.scores.len(),
                k = report.k,
                metric = %report.metric,
                "Outlier scoring complete"
            );
            write_json(&report, output)
        }
        Commands::Synth(args) => {
            let synth_config = SyntheticConfig {
                num_examples: args.examples,
                num_classes: args.classes,
                noise_rate: args.noise_rate,
                signal: args.signal,
                seed: args.seed,
                ..SyntheticConfig::default()
            };
            let dataset = generate(&synth_config)?;
            let output_data = SynthOutput::from(&dataset);
            info!(
                examples = args.examples,
                flipped = output_data.flipped.len(),
                "Generated synthetic dataset"
            );
            write_json(&output_data, output)
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json_output = serde_json::to_string_pretty(value)
        .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;

    match output {
        Some(path) => {
            fs::write(path, json_output)?;
            info!(path = %path.display(), "Wrote report");
        }
        None => println!("{}", json_output),
    }
    Ok(())
}
