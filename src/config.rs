use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

use crate::date_range::{DateRange, INTERNAL_DATE_FORMAT};

pub const DEFAULT_BASE_URL: &str = "https://www.atsenergo.ru/nreport";
pub const DEFAULT_REGION_COLUMN: &str = "Субъект РФ";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for {name}: {value} ({reason})")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Settings for resolving and downloading reports, without the aggregation inputs
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub download_reports_dir: PathBuf,
    pub region_overrides: HashMap<String, String>,
    pub strict_link_text: bool,
    pub request_timeout_secs: u64,
}

impl SourceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(SourceConfig {
            base_url: env::var("BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            download_reports_dir: env::var("DOWNLOAD_REPORTS_DIR")
                .unwrap_or_else(|_| "reports".to_string())
                .into(),
            region_overrides: parse_overrides(&env::var("REGION_OVERRIDES").unwrap_or_default())?,
            strict_link_text: parse_or("STRICT_LINK_TEXT", false)?,
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 10)?,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price_zone: String,
    pub base_url: String,
    pub download_reports_dir: PathBuf,
    pub average_reports_dir: PathBuf,
    pub target_region: String,
    pub hours_start: u32,
    pub hours_end: u32,
    pub price_column: String,
    pub region_column: String,
    /// Price zones whose reports are listed under another zone's code
    pub region_overrides: HashMap<String, String>,
    pub strict_link_text: bool,
    pub request_timeout_secs: u64,
    /// 0 schedules every date at once
    pub download_concurrency: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let start_date = parse_date(&required("START_DATE")?, "START_DATE")?;
        let end_date = parse_date(&required("END_DATE")?, "END_DATE")?;
        Self::from_env_with(start_date, end_date, required("PRICE_ZONE")?)
    }

    /// Date range and price zone given by the caller, everything else from the environment
    pub fn from_env_with(
        start_date: NaiveDate,
        end_date: NaiveDate,
        price_zone: String,
    ) -> Result<Self, ConfigError> {
        let hours_start = parse_or("HOURS_START", 0)?;
        let hours_end = parse_or("HOURS_END", 23)?;
        if hours_start > hours_end {
            return Err(ConfigError::Invalid {
                name: "HOURS_START".to_string(),
                value: hours_start.to_string(),
                reason: format!("greater than HOURS_END ({hours_end})"),
            });
        }

        let SourceConfig {
            base_url,
            download_reports_dir,
            region_overrides,
            strict_link_text,
            request_timeout_secs,
        } = SourceConfig::from_env()?;

        Ok(Config {
            start_date,
            end_date,
            price_zone,
            base_url,
            download_reports_dir,
            average_reports_dir: env::var("AVERAGE_REPORTS_DIR")
                .unwrap_or_else(|_| "average_reports".to_string())
                .into(),
            target_region: required("TARGET_REGION")?,
            hours_start,
            hours_end,
            price_column: required("PRICE_FOR_CALCULATED")?,
            region_column: env::var("REGION_COLUMN")
                .unwrap_or_else(|_| DEFAULT_REGION_COLUMN.to_string()),
            region_overrides,
            strict_link_text,
            request_timeout_secs,
            download_concurrency: parse_or("DOWNLOAD_CONCURRENCY", 0)?,
        })
    }

    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    /// The download half of the configuration
    pub fn source(&self) -> SourceConfig {
        SourceConfig {
            base_url: self.base_url.clone(),
            download_reports_dir: self.download_reports_dir.clone(),
            region_overrides: self.region_overrides.clone(),
            strict_link_text: self.strict_link_text,
            request_timeout_secs: self.request_timeout_secs,
        }
    }

    pub fn output_csv(&self) -> PathBuf {
        self.output_path("csv")
    }

    /// Office Open XML workbook; no maintained crate writes the legacy BIFF `.xls` format
    pub fn output_xlsx(&self) -> PathBuf {
        self.output_path("xlsx")
    }

    pub fn output_xml(&self) -> PathBuf {
        self.output_path("xml")
    }

    /// `{TARGET_REGION}_{START_DATE}_{END_DATE}.{ext}` under the output directory
    fn output_path(&self, extension: &str) -> PathBuf {
        let file_name = format!(
            "{}_{}_{}.{extension}",
            self.target_region,
            self.start_date.format(INTERNAL_DATE_FORMAT),
            self.end_date.format(INTERNAL_DATE_FORMAT),
        );
        Path::new(&self.average_reports_dir).join(file_name)
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name.to_string()))
}

fn parse_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name: name.to_string(),
            value,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_date(value: &str, name: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), INTERNAL_DATE_FORMAT).map_err(|e| {
        ConfigError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Parse `from:to` pairs separated by commas, e.g. `hydro:eur,fe:sib`
pub fn parse_overrides(value: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut overrides = HashMap::new();
    for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match pair.split_once(':') {
            Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
                overrides.insert(from.trim().to_string(), to.trim().to_string());
            }
            _ => {
                return Err(ConfigError::Invalid {
                    name: "REGION_OVERRIDES".to_string(),
                    value: pair.to_string(),
                    reason: "expected from:to".to_string(),
                })
            }
        }
    }
    Ok(overrides)
}
