//! Credit Risk Engine - offline tooling
//!
//! - `sample`: write a synthetic labeled loan book
//! - `train`:  fit scaler + random forest and write the model artifact
//! - `assess`: score applications from a file (or stdin) with an artifact

use clap::{Args, Parser, Subcommand};
use credit_risk_engine::providers::dataset;
use credit_risk_engine::utils::constants::{
    DEFAULT_ARTIFACT_PATH, DEFAULT_MAX_DEPTH, DEFAULT_MIN_SAMPLES_SPLIT, DEFAULT_N_TREES,
    DEFAULT_SEED,
};
use credit_risk_engine::{
    ArtifactStore, CreditApplication, ForestConfig, RiskAssessmentEngine, RiskAssessmentResult,
};
use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "credit_risk", version, about = "Credit application risk scoring")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a synthetic labeled dataset (.json or .jsonl).
    Sample(SampleArgs),
    /// Train a model artifact from labeled applications.
    Train(TrainArgs),
    /// Assess one application or an array of applications.
    Assess(AssessArgs),
}

#[derive(Debug, Args)]
struct SampleArgs {
    /// Number of applications to generate.
    #[arg(short = 'n', long, default_value_t = 2000)]
    count: usize,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Output file; `.jsonl` writes one record per line.
    #[arg(short, long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct TrainArgs {
    /// Labeled applications (.json array or .jsonl).
    #[arg(short, long)]
    data: PathBuf,

    #[arg(short, long, default_value = DEFAULT_ARTIFACT_PATH)]
    out: PathBuf,

    #[arg(long, default_value_t = DEFAULT_N_TREES)]
    trees: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    #[arg(long, default_value_t = DEFAULT_MIN_SAMPLES_SPLIT)]
    min_samples_split: usize,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
}

#[derive(Debug, Args)]
struct AssessArgs {
    #[arg(short, long, default_value = DEFAULT_ARTIFACT_PATH)]
    artifact: PathBuf,

    /// Application JSON file, or `-` for stdin.
    #[arg(short, long, default_value = "-")]
    input: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match Cli::parse().command {
        Command::Sample(args) => sample(args),
        Command::Train(args) => train(args),
        Command::Assess(args) => assess(args),
    }
}

fn sample(args: SampleArgs) -> Result<()> {
    let records = dataset::generate_synthetic(args.count, args.seed);
    let defaults = records.iter().filter(|r| r.defaulted).count();
    dataset::save_labeled(&records, &args.out)?;

    info!(
        records = records.len(),
        defaults,
        out = %args.out.display(),
        "Synthetic dataset written"
    );
    Ok(())
}

fn train(args: TrainArgs) -> Result<()> {
    let records = dataset::load_labeled(&args.data)?;

    let config = ForestConfig {
        n_trees: args.trees,
        max_depth: args.max_depth,
        min_samples_split: args.min_samples_split,
        seed: args.seed,
        ..ForestConfig::default()
    };

    let artifact = ArtifactStore::train(&records, config)?;
    ArtifactStore::save(&artifact, &args.out)?;

    let engine = RiskAssessmentEngine::from_artifact(&artifact)?;
    let info = engine.model_info();
    info!(
        out = %args.out.display(),
        scorer = %info.scorer,
        background = info.background_size,
        baseline = info.baseline_probability,
        "Model artifact written"
    );
    Ok(())
}

/// One application or many
#[derive(Deserialize)]
#[serde(untagged)]
enum AssessInput {
    One(CreditApplication),
    Many(Vec<CreditApplication>),
}

#[derive(Serialize)]
#[serde(untagged)]
enum AssessOutput {
    One(RiskAssessmentResult),
    Many(Vec<RiskAssessmentResult>),
}

fn assess(args: AssessArgs) -> Result<()> {
    let raw = if args.input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .wrap_err("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(&args.input)
            .wrap_err_with(|| format!("Failed to read {}", args.input))?
    };

    let input: AssessInput =
        serde_json::from_str(&raw).wrap_err("Input is not a credit application (or array of them)")?;

    let artifact = ArtifactStore::load(&args.artifact)?;
    let engine = RiskAssessmentEngine::from_artifact(&artifact)?;

    let output = match input {
        AssessInput::One(app) => AssessOutput::One(engine.assess(&app)?),
        AssessInput::Many(apps) => {
            let results = engine
                .assess_batch(&apps)
                .into_iter()
                .enumerate()
                .map(|(i, r)| r.map_err(|e| eyre!("application {}: {}", i, e)))
                .collect::<Result<Vec<_>>>()?;
            AssessOutput::Many(results)
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
