//! Fetch command implementation

use crate::catalog::PartitionCatalog;
use crate::downloader::config::{
    DEFAULT_BACKOFF, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, MAX_ATTEMPTS_LIMIT,
    MAX_CONCURRENCY,
};
use crate::downloader::{DrainCoordinator, FetchSettings, RetryPolicy, RunError, RunReport};
use crate::filter::{KeyFilter, TargetDate};
use crate::metrics::init_metrics;
use crate::store::ObjectStoreRemote;
use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::CliError;

/// Parse and validate concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// MSO delta fetcher CLI
#[derive(Parser, Debug)]
#[command(name = "mso-fetch")]
#[command(about = "Download one day of MSO delta objects from S3", long_about = None)]
#[command(version)]
pub struct Cli {
    /// AWS region
    #[arg(short = 'r', long, default_value = "us-east-1")]
    pub region: String,

    /// Bucket name
    #[arg(short = 'b', long, default_value = "rovi-cdw")]
    pub bucket: String,

    /// Date to fetch (YYYYMMDD, default: today)
    #[arg(short = 'd', long)]
    pub date: Option<TargetDate>,

    /// File listing the MSOs as `code,name` records
    #[arg(short = 'm', long = "mso-list", default_value = "mso-list.csv")]
    pub mso_list: PathBuf,

    /// Prefix path in the bucket
    #[arg(short = 'p', long = "prefix", default_value = "event/tv_viewership")]
    pub prefix: String,

    /// Max attempts per object before it is recorded as failed
    #[arg(
        short = 'M',
        long,
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..=MAX_ATTEMPTS_LIMIT as i64)
    )]
    pub max_attempts: u32,

    /// Number of files to download concurrently
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY, value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Verbose: log progress and every download to the screen
    #[arg(short = 'v', long, default_value_t = true, action = ArgAction::Set)]
    pub verbose: bool,

    /// Custom S3-compatible endpoint (e.g., http://localhost:9000)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Directory under which remote keys are mirrored
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Seconds to sleep between attempts on the same object
    #[arg(long, default_value_t = DEFAULT_BACKOFF.as_secs())]
    pub backoff_secs: u64,

    /// Summary format (json or human)
    #[arg(long, default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g., 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// Target date, defaulting to today
    pub fn target_date(&self) -> TargetDate {
        self.date.unwrap_or_else(TargetDate::today)
    }

    /// Fetch settings derived from the arguments
    pub fn settings(&self) -> FetchSettings {
        FetchSettings::default()
            .with_concurrency(self.concurrency)
            .with_retry(RetryPolicy::new(
                self.max_attempts,
                Duration::from_secs(self.backoff_secs),
            ))
            .with_output_root(self.output_dir.clone())
    }

    /// Log the effective parameters
    pub fn log_params(&self) {
        info!(
            region = %self.region,
            bucket = %self.bucket,
            date = %self.target_date(),
            mso_list = %self.mso_list.display(),
            prefix = %self.prefix,
            max_attempts = self.max_attempts,
            concurrency = self.concurrency,
            verbose = self.verbose,
            output_dir = %self.output_dir.display(),
            "Provided parameters"
        );
    }

    /// Run the fetch and return the final report
    pub async fn execute(&self) -> Result<RunReport, CliError> {
        if self.verbose {
            self.log_params();
        }

        if let Some(addr) = self.metrics_addr {
            init_metrics(addr).map_err(CliError::ConfigurationError)?;
        }

        let partitions = PartitionCatalog::load(&self.mso_list)?;
        let store = Arc::new(ObjectStoreRemote::s3(
            &self.region,
            &self.bucket,
            self.endpoint.as_deref(),
        )?);
        let filter = KeyFilter::new(self.prefix.clone(), self.target_date());

        let coordinator =
            DrainCoordinator::new(store, filter, self.settings())?.with_progress(self.progress_bar());

        match coordinator.run(&partitions).await {
            Ok(report) => Ok(report),
            Err(RunError::Listing {
                partition,
                source,
                accounted,
            }) => {
                warn!(
                    partition = %partition,
                    succeeded = accounted.succeeded,
                    failed = accounted.failed_keys.len(),
                    "Run aborted; jobs dispatched before the failure were drained"
                );
                Err(CliError::RunError(RunError::Listing {
                    partition,
                    source,
                    accounted,
                }))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Print the final report in the selected format
    pub fn print_report(&self, report: &RunReport) {
        match self.output_format {
            OutputFormat::Human => {
                for line in report.summary_lines() {
                    println!("{line}");
                }
            }
            OutputFormat::Json => match serde_json::to_string(report) {
                Ok(json) => println!("{json}"),
                Err(e) => error!("Failed to serialize report: {}", e),
            },
        }
    }

    /// Progress bar shown when per-object logging is off
    fn progress_bar(&self) -> ProgressBar {
        if self.verbose {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(0);
        match ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
        {
            Ok(style) => pb.set_style(style.progress_chars("#>-")),
            Err(e) => warn!("Invalid progress template: {}", e),
        }
        pb
    }
}
