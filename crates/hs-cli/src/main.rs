use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hs_analysis::{Pipeline, PipelineConfig, PipelineReport};
use hs_data::{load_dataset, CatalogFilter, OutputWriter, RunManifest, TrajectoryLoader};
use hs_types::MetricKind;

#[derive(Parser, Debug)]
#[command(name = "hs-postproc")]
#[command(version)]
#[command(about = "Normalize reward logs across environments and rank hyperparameter release orders")]
struct Cli {
    /// JSON configuration file; flags and environment variables override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Folder with the per-configuration reward logs
    #[arg(short, long, env = "HS_INPUT_DIR")]
    input_dir: Option<PathBuf>,

    /// Folder for the output tables
    #[arg(short, long, env = "HS_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Environments to analyse (comma-separated, default: all found)
    #[arg(long, value_delimiter = ',')]
    envs: Vec<String>,

    /// Algorithms to analyse (comma-separated, default: all found)
    #[arg(long, value_delimiter = ',')]
    algs: Vec<String>,

    /// Metrics to rank (comma-separated, default: all)
    #[arg(long, value_delimiter = ',')]
    metrics: Vec<MetricKind>,

    /// Penalty multiplier for undefined metric values
    #[arg(long)]
    penalty_factor: Option<f64>,

    /// Fail on malformed reward lines instead of skipping them
    #[arg(long)]
    strict: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Defaults, then the config file, then flags and environment variables.
fn resolve_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(dir) = &cli.input_dir {
        config.input_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if !cli.envs.is_empty() {
        config = config.with_environments(cli.envs.clone());
    }
    if !cli.algs.is_empty() {
        config = config.with_algorithms(cli.algs.clone());
    }
    if !cli.metrics.is_empty() {
        config = config.with_metrics(cli.metrics.clone());
    }
    if let Some(factor) = cli.penalty_factor {
        config = config.with_penalty_factor(factor);
    }

    config.validate()?;
    Ok(config)
}

fn write_outputs(config: &PipelineConfig, report: &PipelineReport, manifest: &mut RunManifest) -> Result<()> {
    let writer = OutputWriter::new(&config.output_dir)?;

    writer.write_quantiles(&report.quantiles)?;
    for (alg, rows) in &report.summaries {
        writer.write_summary(alg, rows)?;
    }
    writer.write_global_best(&report.global_best)?;
    writer.write_release_orders(&report.release_orders)?;
    for ((alg, metric), rows) in &report.levels {
        writer.write_levels(alg, *metric, rows)?;
    }

    manifest.environments = report.quantiles.iter().map(|q| q.env.clone()).collect();
    manifest.algorithms = report.summaries.keys().cloned().collect();
    writer.write_manifest(manifest)?;

    tracing::info!("Wrote outputs to {}", writer.output_root.display());
    Ok(())
}

fn run(config: &PipelineConfig, strict: bool) -> Result<PipelineReport> {
    let filter = CatalogFilter::new(&config.environments, &config.algorithms);
    let loader = if strict {
        TrajectoryLoader::strict()
    } else {
        TrajectoryLoader::new()
    };
    let (dataset, skipped) = load_dataset(&config.input_dir, &filter, &loader)
        .with_context(|| format!("reading reward logs from {}", config.input_dir.display()))?;

    let report = Pipeline::new(config.clone())?.run(&dataset)?;
    for outcome in &report.outcomes {
        tracing::info!(
            "{} / {}: global best {}, release order {}",
            outcome.alg,
            outcome.metric,
            outcome.global_best.config,
            outcome.search.order
        );
    }

    let mut manifest = RunManifest::new(
        config.input_dir.clone(),
        config.output_dir.clone(),
        serde_json::to_value(config)?,
    );
    manifest.files_loaded = dataset.sets().len();
    manifest.files_skipped = skipped;
    write_outputs(config, &report, &mut manifest)?;

    Ok(report)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = resolve_config(&cli)?;
    tracing::info!(
        "Post-processing {} into {}",
        config.input_dir.display(),
        config.output_dir.display()
    );
    run(&config, cli.strict)?;
    Ok(())
}
