use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pii_ledger::discovery::{discover_transcripts, DiscoveryConfig, DEFAULT_TRANSCRIPT_PATTERN};
use pii_ledger::reader;
use pii_ledger::restart_log::RestartLog;
use pii_ledger::{process_files_parallel, BatchConfig, EngineConfig, RedactionEngine};

#[derive(Parser, Debug)]
#[command(name = "pii-ledger")]
#[command(about = "Redact PII from call transcripts and write an audit ledger per transcript")]
#[command(version)]
struct Args {
    /// Root directory to scan for transcripts
    #[arg(required_unless_present = "stdin")]
    root_dir: Option<PathBuf>,

    /// Engine configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Transcript glob, relative to the root directory
    #[arg(long, default_value = DEFAULT_TRANSCRIPT_PATTERN)]
    pattern: String,

    /// Reprocess transcripts that already have a ledger
    #[arg(long)]
    overwrite_all: bool,

    /// Abort on first error
    #[arg(long)]
    fail_fast: bool,

    /// Suppress console progress bars
    #[arg(long)]
    no_progress: bool,

    /// Stats output file path
    #[arg(long, default_value = "run_stats.json")]
    stats_out: PathBuf,

    /// Maximum transcripts processed at once (default: number of CPUs)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Redact a single transcript read from stdin and print its result as JSON
    #[arg(long, conflicts_with = "root_dir")]
    stdin: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // WHY: stdout carries --stdin results, so logs always go to stderr
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    dotenvy::dotenv().ok();
    let args = Args::parse();
    info!(?args, "Parsed CLI arguments");

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env();

    let engine = RedactionEngine::from_config(&config).context("Invalid engine configuration")?;

    if args.stdin {
        let text = reader::read_stdin().await.context("Failed to read transcript from stdin")?;
        let result = engine.redact(&text).await;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let Some(root_dir) = args.root_dir.as_deref() else {
        anyhow::bail!("A root directory is required unless --stdin is given");
    };
    if !root_dir.is_dir() {
        anyhow::bail!("Root path is not a directory: {}", root_dir.display());
    }

    let discovery_config = DiscoveryConfig {
        pattern: args.pattern.clone(),
        fail_fast: args.fail_fast,
    };
    let discovered = discover_transcripts(root_dir, &discovery_config).await?;
    let (valid, invalid): (Vec<_>, Vec<_>) = discovered.into_iter().partition(|c| c.is_valid());
    for file in &invalid {
        if let Some(ref error) = file.error {
            info!("Skipping {}: {}", file.path.display(), error);
        }
    }

    let mut restart_log = RestartLog::load(root_dir).await;
    restart_log.reset_if_policy_changed(engine.policy().redact_entities());
    let dropped = restart_log.verify_completed_files();
    if !dropped.is_empty() {
        info!(count = dropped.len(), "Restart log entries without a ledger will be reprocessed");
    }

    let batch_config = BatchConfig {
        fail_fast: args.fail_fast,
        overwrite_all: args.overwrite_all,
        concurrency: args.concurrency.unwrap_or_else(num_cpus::get),
        show_progress: !args.no_progress,
    };
    let files = valid.into_iter().map(|f| f.path).collect();
    let outcome = process_files_parallel(&engine, files, &mut restart_log, &batch_config).await;

    // WHY: finished transcripts stay recorded even when fail_fast aborted the run
    restart_log.save(root_dir).await?;
    let run_stats = outcome?;
    run_stats.write_json(&args.stats_out).await?;

    println!("pii-ledger v{} - redaction complete", env!("CARGO_PKG_VERSION"));
    println!(
        "Processed: {}, degraded: {}, skipped: {}, failed: {}",
        run_stats.files_processed, run_stats.files_degraded, run_stats.files_skipped, run_stats.files_failed
    );
    println!(
        "Entities detected: {}, redacted: {}",
        run_stats.total_entities_detected, run_stats.total_entities_redacted
    );
    if !invalid.is_empty() {
        println!("Files with issues: {}", invalid.len());
    }

    Ok(())
}
