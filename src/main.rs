//! Amplify access log archiver
//!
//! Loads configuration, archives the requested window for every selected
//! application and writes the run report.

use amplify_logs::{retention_window, run_applications, ArchiveConfig, RangeGenerator};
use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Archive Amplify hosting access logs
///
/// # Usage
/// ```bash
/// # Last `retention_days` days for every configured application
/// amplify-logs --config amplify_logs.yaml
///
/// # One application, explicit window
/// amplify-logs --config amplify_logs.yaml --app booking_example_com \
///     --start-date 2024-01-01 --end-date 2024-01-31
/// ```
#[derive(Debug, Parser)]
#[command(name = "amplify-logs", version, about)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "amplify_logs.yaml")]
    config: PathBuf,

    /// Archive only this application (default: all configured applications)
    #[arg(long)]
    app: Option<String>,

    /// First day to archive (YYYY-MM-DD)
    #[arg(long, requires = "end_date")]
    start_date: Option<NaiveDate>,

    /// Last day to archive (YYYY-MM-DD)
    #[arg(long, requires = "start_date")]
    end_date: Option<NaiveDate>,

    /// Override the configured chunk length in days
    #[arg(long)]
    chunk_days: Option<u32>,

    /// Override the configured report path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .with_line_number(true)
        .init();

    info!("Loading configuration from: {}", cli.config.display());
    let config = ArchiveConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    let apps = match &cli.app {
        Some(name) => vec![config.for_app(name)?.clone()],
        None => config.applications.clone(),
    };

    let (start, end) = match (cli.start_date, cli.end_date) {
        (Some(start), Some(end)) => (start, end),
        _ => retention_window(Utc::now().date_naive(), config.retention_days),
    };
    if start > end {
        bail!("start date {} is after end date {}", start, end);
    }

    let chunk_days = cli.chunk_days.unwrap_or(config.chunk_days);
    RangeGenerator::new(chunk_days).context("invalid --chunk-days")?;

    info!(
        "Archiving {} application(s) from {} to {} in {}-day chunks",
        apps.len(),
        start,
        end,
        chunk_days
    );
    info!("  - Max split depth: {}", config.fetch.max_depth);
    info!("  - Max attempts: {}", config.fetch.max_attempts);
    info!("  - Storage backend: {}", config.storage.backend);

    let report = run_applications(&config, &apps, start, end, chunk_days).await?;

    let report_path = cli
        .report
        .unwrap_or_else(|| PathBuf::from(&config.report_path));
    report
        .write_to(&report_path)
        .with_context(|| format!("failed to write report {}", report_path.display()))?;

    for line in report.summary_lines() {
        println!("{}", line);
    }

    Ok(())
}
