use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::date_range::INTERNAL_DATE_FORMAT;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected status {status} while downloading {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a fetch did for a given destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Body written to the destination
    Downloaded { bytes: usize },
    /// Destination already existed, no request was made
    Skipped,
}

/// Downloads binary price reports to disk
#[derive(Clone)]
pub struct ReportDownloader {
    client: Client,
}

impl ReportDownloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Download `url` into `destination` unless a file is already there.
    ///
    /// The body is written to a temp file in the destination directory and renamed
    /// into place, so a failed download never leaves a file at `destination`.
    #[instrument(skip(self, url, destination), fields(url = %url, destination = %destination.display()))]
    pub async fn fetch(&self, url: &str, destination: &Path) -> Result<FetchOutcome, DownloadError> {
        if destination.exists() {
            debug!("Report already present, skipping download");
            return Ok(FetchOutcome::Skipped);
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        debug!("Downloaded {} bytes", bytes.len());

        write_atomically(destination, &bytes)?;
        info!("Saved report to {}", destination.display());

        Ok(FetchOutcome::Downloaded { bytes: bytes.len() })
    }
}

fn write_atomically(destination: &Path, bytes: &[u8]) -> Result<(), DownloadError> {
    let io_err = |source: std::io::Error| DownloadError::Io {
        path: destination.to_path_buf(),
        source,
    };

    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut temp_file = NamedTempFile::new_in(dir).map_err(io_err)?;
    temp_file.write_all(bytes).map_err(io_err)?;
    temp_file.flush().map_err(io_err)?;
    temp_file
        .persist(destination)
        .map_err(|e| io_err(e.error))?;
    Ok(())
}

/// Deterministic location of the report for one date and price zone
pub fn report_path(download_dir: &Path, region: &str, date: NaiveDate) -> PathBuf {
    download_dir.join(format!(
        "{region}_{}.xls",
        date.format(INTERNAL_DATE_FORMAT)
    ))
}

/// Wrap downloaded bytes for in-memory workbook parsing
pub fn bytes_to_cursor(bytes: Vec<u8>) -> Cursor<Vec<u8>> {
    Cursor::new(bytes)
}
