use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use trailscan_scanner::{Coordinator, ReplaySource, ScanConfig, ScanReport, ScanTrigger};

mod logging;

const EXIT_ABORTED: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "trailscan")]
#[command(about = "Find identifier-shaped fields in CloudTrail event history", long_about = None)]
#[command(version)]
pub struct Cli {
    /// `lookup-events` export to scan (JSON page, NDJSON pages or an array of events)
    events: PathBuf,

    /// TOML file with scan settings; flags below take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Region the event history belongs to
    #[arg(long)]
    region: Option<String>,

    /// Only scan events recorded in the configured region
    #[arg(long)]
    filter_region: bool,

    /// Where to write the CSV summary
    #[arg(long)]
    summary: Option<PathBuf>,

    /// JSON-lines log file, truncated on start
    #[arg(long, default_value = "logs.ndjson")]
    log_file: PathBuf,

    /// Events buffered between pagination and classification
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Events per page served from the export
    #[arg(long)]
    page_size: Option<usize>,

    /// Retries per page before the scan is aborted
    #[arg(long)]
    max_retries: Option<u32>,

    /// Enable trace logging
    #[arg(short, long)]
    verbose: bool,

    /// Log only warnings and errors
    #[arg(long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn level_filter(&self) -> Option<log::LevelFilter> {
        if self.quiet {
            Some(log::LevelFilter::Warn)
        } else if self.verbose {
            Some(log::LevelFilter::Trace)
        } else {
            None
        }
    }

    async fn resolve_config(&self) -> Result<ScanConfig> {
        let mut config = match &self.config {
            Some(path) => ScanConfig::load(path)
                .await
                .with_context(|| format!("Couldn't load config {}", path.display()))?,
            None => ScanConfig::default(),
        };
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(summary) = &self.summary {
            config.summary_path = summary.clone();
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(max_retries) = self.max_retries {
            config.retry.max_retries = max_retries;
        }
        Ok(config)
    }
}

pub async fn main_entry() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::init(&cli.log_file, cli.level_filter()) {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    match run(&cli).await {
        Ok(report) => {
            log_report(&report);
            match report.trigger {
                ScanTrigger::Completed => ExitCode::SUCCESS,
                ScanTrigger::Aborted => ExitCode::from(EXIT_ABORTED),
                ScanTrigger::Interrupted => ExitCode::from(EXIT_INTERRUPTED),
            }
        }
        Err(err) => {
            log::error!(error:% = format!("{err:#}"); "Scan could not start");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<ScanReport> {
    let config = cli.resolve_config().await?;
    let region = cli.filter_region.then_some(config.region.as_str());
    let source = ReplaySource::open(&cli.events, config.page_size, region)
        .await
        .context("Couldn't open event source")?;

    let report = Coordinator::new(Arc::new(source), config)
        .run(interrupt())
        .await?;
    Ok(report)
}

async fn interrupt() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!(error:% = err; "Couldn't listen for interrupts");
        std::future::pending::<()>().await;
    }
}

fn log_report(report: &ScanReport) {
    let message = match report.trigger {
        ScanTrigger::Completed => "Scan finished",
        ScanTrigger::Aborted => "Scan aborted, summary holds partial results",
        ScanTrigger::Interrupted => "Scan interrupted, summary holds partial results",
    };
    let level = match report.trigger {
        ScanTrigger::Completed => log::Level::Info,
        ScanTrigger::Aborted | ScanTrigger::Interrupted => log::Level::Warn,
    };
    log::log!(
        level,
        pages = report.pagination.pages,
        events = report.worker.events,
        malformed = report.worker.malformed,
        discoveries = report.discoveries.len(),
        duration_ms = report.duration_ms;
        "{message}"
    );
}
