use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::date_range::display_date;
use crate::reports::downloader::bytes_to_cursor;

/// Rows 1-2 of every hour sheet are a title block; row 3 holds column names
const HEADER_ROW: u32 = 2;

pub const DATE_LABEL: &str = "Date";

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Failed to open workbook {}: {msg}", path.display())]
    WorkbookOpen { path: PathBuf, msg: String },

    #[error("Failed to read sheet {sheet}: {msg}")]
    SheetRead { sheet: String, msg: String },

    #[error("Sheet {sheet} has no column '{column}'")]
    MissingColumn { sheet: String, column: String },
}

/// A downloaded (or expected) report for one date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    pub date: NaiveDate,
    pub path: PathBuf,
}

/// Mean price for one date; `None` when no row matched the target region
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl AggregateRow {
    pub fn display_date(&self) -> String {
        display_date(self.date)
    }
}

/// Rows ordered by date, plus the label of the value column
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTable {
    pub value_label: String,
    pub rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn column_labels(&self) -> [&str; 2] {
        [DATE_LABEL, &self.value_label]
    }
}

/// Averages one price column over the rows of a target region in hourly sheets
///
/// # Expected Sheet Structure:
/// ```text
/// Row 1-2: Report title and trading date
/// Row 3:   Column names (node number, node name, region, price, ...)
/// Row 4+:  One row per node
/// ```
/// Sheets are named by hour of day ("0" .. "23").
pub struct Aggregator {
    target_region: String,
    region_column: String,
    price_column: String,
    hours: RangeInclusive<u32>,
}

impl Aggregator {
    pub fn new(
        target_region: impl Into<String>,
        region_column: impl Into<String>,
        price_column: impl Into<String>,
        hours: RangeInclusive<u32>,
    ) -> Self {
        Self {
            target_region: target_region.into(),
            region_column: region_column.into(),
            price_column: price_column.into(),
            hours,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.target_region.clone(),
            config.region_column.clone(),
            config.price_column.clone(),
            config.hours_start..=config.hours_end,
        )
    }

    pub fn value_label(&self) -> String {
        format!("Average {}", self.price_column)
    }

    /// Names of the hour sheets to read, both bounds included
    pub fn hour_sheets(&self) -> Vec<String> {
        self.hours.clone().map(|h| h.to_string()).collect()
    }

    /// One row per file, ordered by date. Unreadable files give a null value.
    pub fn aggregate(&self, files: &[ReportFile]) -> AggregateTable {
        let mut files: Vec<&ReportFile> = files.iter().collect();
        files.sort_by_key(|f| f.date);

        let mut rows = Vec::with_capacity(files.len());
        for file in files {
            let value = match self.file_mean(&file.path) {
                Ok(Some(mean)) => {
                    info!("{}: mean {} = {:.2}", file.date, self.price_column, mean);
                    Some(mean)
                }
                Ok(None) => {
                    warn!(
                        "{}: no rows for region '{}', value left empty",
                        file.date, self.target_region
                    );
                    None
                }
                Err(e) => {
                    error!(
                        "Failed to aggregate report for {} ({}): {}",
                        file.date,
                        file.path.display(),
                        e
                    );
                    None
                }
            };

            rows.push(AggregateRow {
                date: file.date,
                value,
            });
        }

        AggregateTable {
            value_label: self.value_label(),
            rows,
        }
    }

    /// Mean of the price column over matching rows of every hour sheet in the file
    pub fn file_mean(&self, path: &Path) -> Result<Option<f64>, AggregateError> {
        let open_err = |msg: String| AggregateError::WorkbookOpen {
            path: path.to_path_buf(),
            msg,
        };

        let bytes = std::fs::read(path).map_err(|e| open_err(e.to_string()))?;
        let mut workbook =
            open_workbook_auto_from_rs(bytes_to_cursor(bytes)).map_err(|e| open_err(e.to_string()))?;

        let mut prices = Vec::new();
        for sheet in self.hour_sheets() {
            let range = match workbook.worksheet_range(&sheet) {
                Ok(range) => range,
                Err(e) => {
                    warn!(
                        "Skipping sheet in {}: {}",
                        path.display(),
                        AggregateError::SheetRead {
                            sheet: sheet.clone(),
                            msg: e.to_string(),
                        }
                    );
                    continue;
                }
            };

            match self.sheet_prices(&range, &sheet) {
                Ok(mut sheet_prices) => {
                    debug!("Sheet {}: {} matching rows", sheet, sheet_prices.len());
                    prices.append(&mut sheet_prices);
                }
                Err(e) => warn!("Skipping sheet in {}: {}", path.display(), e),
            }
        }

        Ok(mean(&prices))
    }

    /// Prices of rows whose region column equals the target region
    fn sheet_prices(&self, range: &Range<Data>, sheet: &str) -> Result<Vec<f64>, AggregateError> {
        let (Some((_, first_col)), Some((last_row, last_col))) = (range.start(), range.end())
        else {
            return Err(AggregateError::SheetRead {
                sheet: sheet.to_string(),
                msg: "sheet is empty".to_string(),
            });
        };

        let find_column = |name: &str| {
            (first_col..=last_col)
                .find(|&col| {
                    range
                        .get_value((HEADER_ROW, col))
                        .and_then(cell_text)
                        .is_some_and(|text| text == name.trim())
                })
                .ok_or_else(|| AggregateError::MissingColumn {
                    sheet: sheet.to_string(),
                    column: name.to_string(),
                })
        };
        let region_col = find_column(self.region_column.as_str())?;
        let price_col = find_column(self.price_column.as_str())?;

        let target = self.target_region.trim();
        let mut prices = Vec::new();
        for row in HEADER_ROW + 1..=last_row {
            let matches = range
                .get_value((row, region_col))
                .and_then(cell_text)
                .is_some_and(|region| region == target);
            if !matches {
                continue;
            }
            match range.get_value((row, price_col)).and_then(cell_number) {
                Some(price) => prices.push(price),
                None => debug!("Sheet {}, row {}: no numeric price", sheet, row + 1),
            }
        }

        Ok(prices)
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) => Some(s.trim().to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(f.to_string()),
        _ => None,
    }
}

fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) if f.is_finite() => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => {
            let normalized: String = s
                .trim()
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            normalized.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
