use std::path::PathBuf;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{Config, SourceConfig};
use crate::fetch_error::FetchError;
use crate::http_client::build_client;
use crate::link_resolver::{LinkResolver, ReportLink};
use crate::reports::aggregator::{AggregateTable, Aggregator, ReportFile};
use crate::reports::downloader::{report_path, DownloadError, FetchOutcome, ReportDownloader};
use crate::reports::export::{self, ExportError, ExportPaths};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Aggregation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result of one date's resolve + download unit
#[derive(Debug)]
pub struct DateOutcome {
    pub date: NaiveDate,
    pub path: PathBuf,
    pub result: Result<FetchOutcome, PipelineError>,
}

#[derive(Debug)]
pub struct BatchSummary {
    pub table: AggregateTable,
    pub outputs: ExportPaths,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: Vec<(NaiveDate, String)>,
}

/// Link resolution and report download for one price zone
#[derive(Clone)]
pub struct ReportSource {
    resolver: LinkResolver,
    downloader: ReportDownloader,
    download_dir: PathBuf,
}

impl ReportSource {
    pub fn new(resolver: LinkResolver, downloader: ReportDownloader, download_dir: PathBuf) -> Self {
        Self {
            resolver,
            downloader,
            download_dir,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        Self::from_source_config(&config.source())
    }

    /// Resolver and downloader sharing one client (one connection pool)
    pub fn from_source_config(config: &SourceConfig) -> Result<Self, PipelineError> {
        let client = build_client(config.request_timeout())?;
        let resolver = LinkResolver::new(client.clone(), config.base_url.clone())
            .with_region_overrides(config.region_overrides.clone())
            .with_strict_link_text(config.strict_link_text);
        Ok(Self::new(
            resolver,
            ReportDownloader::new(client),
            config.download_reports_dir.clone(),
        ))
    }

    pub fn report_path(&self, region: &str, date: NaiveDate) -> PathBuf {
        report_path(&self.download_dir, region, date)
    }

    pub async fn resolve(&self, date: NaiveDate, region: &str) -> Result<ReportLink, FetchError> {
        self.resolver.resolve(date, region).await
    }

    /// Resolve and download the report for one date.
    ///
    /// An existing report short-circuits before the listing page is requested.
    #[instrument(skip(self, date), fields(date = %date))]
    pub async fn fetch_date(
        &self,
        date: NaiveDate,
        region: &str,
    ) -> Result<FetchOutcome, PipelineError> {
        let path = self.report_path(region, date);
        if path.exists() {
            info!("Report for {} already at {}, skipping", date, path.display());
            return Ok(FetchOutcome::Skipped);
        }

        let link = self.resolver.resolve(date, region).await?;
        info!("Resolved report link for {}: {}", date, link.url);
        let outcome = self.downloader.fetch(&link.url, &path).await?;
        Ok(outcome)
    }

    /// Run every date's unit concurrently and wait for all of them.
    ///
    /// A failed date never cancels the others; `concurrency` 0 schedules all dates at once.
    pub async fn fetch_all(
        &self,
        dates: &[NaiveDate],
        region: &str,
        concurrency: usize,
    ) -> Vec<DateOutcome> {
        let limit = if concurrency == 0 {
            dates.len().max(1)
        } else {
            concurrency
        };

        let pb = ProgressBar::new(dates.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} reports ({msg})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );

        let mut outcomes: Vec<DateOutcome> = stream::iter(dates.iter().copied())
            .map(|date| {
                let pb = pb.clone();
                async move {
                    let result = self.fetch_date(date, region).await;
                    if let Err(e) = &result {
                        error!("Failed to fetch report for {}: {}", date, e);
                    }
                    pb.inc(1);
                    DateOutcome {
                        date,
                        path: self.report_path(region, date),
                        result,
                    }
                }
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        pb.finish_and_clear();
        outcomes.sort_by_key(|o| o.date);
        outcomes
    }
}

/// Full batch: download every date in the configured range, then aggregate and export.
///
/// Per-date failures are logged and end up as empty values in the outputs.
#[instrument(skip(config), fields(start = %config.start_date, end = %config.end_date))]
pub async fn run_batch(config: &Config) -> Result<BatchSummary, PipelineError> {
    let range = config.date_range();
    let dates = range.dates();
    debug!("Report dates: [{}]", range.date_strings().join(", "));
    if dates.is_empty() {
        warn!(
            "START_DATE {} is after END_DATE {}, nothing to fetch",
            config.start_date, config.end_date
        );
    }
    info!(
        "Fetching {} reports for price zone {}",
        dates.len(),
        config.price_zone
    );

    let source = ReportSource::from_config(config)?;
    let outcomes = source
        .fetch_all(&dates, &config.price_zone, config.download_concurrency)
        .await;

    let mut downloaded = 0;
    let mut skipped = 0;
    let mut failed = Vec::new();
    let mut files = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match &outcome.result {
            Ok(FetchOutcome::Downloaded { .. }) => downloaded += 1,
            Ok(FetchOutcome::Skipped) => skipped += 1,
            Err(e) => failed.push((outcome.date, e.to_string())),
        }
        files.push(ReportFile {
            date: outcome.date,
            path: outcome.path,
        });
    }
    info!(
        "Download phase complete: {} downloaded, {} already present, {} failed",
        downloaded,
        skipped,
        failed.len()
    );

    let aggregator = Aggregator::from_config(config);
    // calamine is synchronous
    let table = tokio::task::spawn_blocking(move || aggregator.aggregate(&files)).await?;

    let outputs = ExportPaths {
        csv: config.output_csv(),
        xlsx: config.output_xlsx(),
        xml: config.output_xml(),
    };
    export::write_all(&table, &outputs)?;

    Ok(BatchSummary {
        table,
        outputs,
        downloaded,
        skipped,
        failed,
    })
}
