//! Calendar date ranges and the textual date forms used across the pipeline.

use chrono::{Days, NaiveDate};

/// Dates as they appear in configuration and report file names (`02-10-2024`)
pub const INTERNAL_DATE_FORMAT: &str = "%d-%m-%Y";

/// Dates as the listing page expects them in the `rdate` query parameter (`20241002`)
pub const COMPACT_DATE_FORMAT: &str = "%Y%m%d";

/// Dates as they are emitted in the aggregate outputs (`02.10.2024`)
pub const DISPLAY_DATE_FORMAT: &str = "%d.%m.%Y";

/// Inclusive range of calendar dates, stepping one day at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Every date from start to end, both ends included. Empty when start > end.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut current = self.start;
        while current <= self.end {
            dates.push(current);
            match current.checked_add_days(Days::new(1)) {
                Some(next) => current = next,
                None => break,
            }
        }
        dates
    }

    /// The same sequence rendered in [`INTERNAL_DATE_FORMAT`]
    pub fn date_strings(&self) -> Vec<String> {
        self.dates()
            .into_iter()
            .map(|d| d.format(INTERNAL_DATE_FORMAT).to_string())
            .collect()
    }
}

pub fn parse_internal_date(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(value.trim(), INTERNAL_DATE_FORMAT)
}

pub fn compact_date(date: NaiveDate) -> String {
    date.format(COMPACT_DATE_FORMAT).to_string()
}

pub fn display_date(date: NaiveDate) -> String {
    date.format(DISPLAY_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_range_is_inclusive() {
        let range = DateRange::new(date(2024, 10, 2), date(2024, 10, 5));
        let dates = range.dates();
        assert_eq!(dates.len(), 4);
        assert_eq!(dates.first(), Some(&date(2024, 10, 2)));
        assert_eq!(dates.last(), Some(&date(2024, 10, 5)));
    }

    #[test]
    fn test_range_strictly_increasing() {
        let range = DateRange::new(date(2024, 2, 27), date(2024, 3, 2));
        let dates = range.dates();
        // 2024 is a leap year: 27, 28, 29 Feb, 1, 2 Mar
        assert_eq!(dates.len(), 5);
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
        assert!(dates.contains(&date(2024, 2, 29)));
    }

    #[test]
    fn test_single_day_range() {
        let range = DateRange::new(date(2025, 1, 27), date(2025, 1, 27));
        assert_eq!(range.dates(), vec![date(2025, 1, 27)]);
    }

    #[test]
    fn test_reversed_range_is_empty() {
        let range = DateRange::new(date(2024, 10, 3), date(2024, 10, 2));
        assert!(range.dates().is_empty());
        assert!(range.date_strings().is_empty());
    }

    #[test]
    fn test_length_matches_day_difference() {
        let start = date(2023, 12, 15);
        let end = date(2024, 1, 20);
        let range = DateRange::new(start, end);
        let expected = (end - start).num_days() as usize + 1;
        assert_eq!(range.dates().len(), expected);
    }

    #[test]
    fn test_date_strings_use_internal_format() {
        let range = DateRange::new(date(2024, 10, 2), date(2024, 10, 3));
        assert_eq!(range.date_strings(), vec!["02-10-2024", "03-10-2024"]);
    }

    #[test]
    fn test_date_conversions() {
        let d = parse_internal_date("27-01-2025").unwrap();
        assert_eq!(compact_date(d), "20250127");
        assert_eq!(display_date(d), "27.01.2025");
        assert!(parse_internal_date("2025-01-27").is_err());
    }
}
