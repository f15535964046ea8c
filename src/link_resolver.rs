use std::collections::HashMap;

use chrono::NaiveDate;
use reqwest::{StatusCode, Url};
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};

use crate::date_range::compact_date;
use crate::fetch_error::FetchError;

pub const REPORT_NAME: &str = "big_nodes_prices_pub";

/// Marker every downloadable report href carries
const FILE_ID_MARKER: &str = "fid=";
/// Archived duplicates of the same report are skipped
const ARCHIVE_MARKER: &str = "zip";

/// A report download URL resolved for one date and the caller's price zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLink {
    pub date: NaiveDate,
    pub region: String,
    pub url: String,
}

#[derive(Clone)]
pub struct LinkResolver {
    client: reqwest::Client,
    base_url: String,
    region_overrides: HashMap<String, String>,
    strict_link_text: bool,
}

impl LinkResolver {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            region_overrides: HashMap::new(),
            strict_link_text: false,
        }
    }

    /// Zones whose reports are filed under another zone's listing
    pub fn with_region_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.region_overrides = overrides;
        self
    }

    /// Also require the caller's region code in the visible link text
    pub fn with_strict_link_text(mut self, strict: bool) -> Self {
        self.strict_link_text = strict;
        self
    }

    /// Region code to put in the listing query for a caller-facing region
    pub fn listing_region<'a>(&'a self, region: &'a str) -> &'a str {
        self.region_overrides
            .get(region)
            .map(String::as_str)
            .unwrap_or(region)
    }

    pub fn listing_url(&self, date: NaiveDate, region: &str) -> Result<Url, FetchError> {
        let rdate = compact_date(date);
        Url::parse_with_params(
            &self.base_url,
            &[
                ("rname", REPORT_NAME),
                ("region", self.listing_region(region)),
                ("rdate", rdate.as_str()),
            ],
        )
        .map_err(|e| FetchError::InvalidUrl(format!("{}: {e}", self.base_url)))
    }

    #[instrument(skip(self, date), fields(date = %date))]
    pub async fn resolve(&self, date: NaiveDate, region: &str) -> Result<ReportLink, FetchError> {
        let url = self.listing_url(date, region)?;
        debug!("Requesting listing page {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        debug!("Received HTTP response with status: {}", status);

        if status != StatusCode::OK {
            warn!("Failed to load listing page {}: status {}", url, status);
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await?;
        debug!("Retrieved HTML content, size: {} bytes", html.len());

        let mut links = self.extract_links(&html, region)?;
        match links.len() {
            0 => {
                warn!("No report links found on {}", url);
                Err(FetchError::LinkNotFound {
                    url: url.to_string(),
                })
            }
            1 => Ok(ReportLink {
                date,
                region: region.to_string(),
                url: links.remove(0),
            }),
            count => {
                warn!("Found {} report links on {}, expected one", count, url);
                Err(FetchError::LinkAmbiguous {
                    url: url.to_string(),
                    count,
                })
            }
        }
    }

    /// Collect absolute URLs of every anchor that points at a report file
    #[instrument(skip(self, html), fields(html_size = html.len()))]
    fn extract_links(&self, html: &str, region: &str) -> Result<Vec<String>, FetchError> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        let document = Html::parse_document(html);
        let anchor_selector = Selector::parse("a[href]").unwrap();
        let region_lower = region.to_lowercase();

        let mut links = Vec::new();
        for anchor in document.select(&anchor_selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !href.contains(FILE_ID_MARKER) || href.contains(ARCHIVE_MARKER) {
                continue;
            }
            if self.strict_link_text {
                let text = anchor.text().collect::<String>();
                if !text.to_lowercase().contains(&region_lower) {
                    debug!("Skipping link for another region: '{}'", text.trim());
                    continue;
                }
            }
            match base.join(href) {
                Ok(full) => links.push(full.to_string()),
                Err(e) => warn!("Skipping unparseable href '{}': {}", href, e),
            }
        }

        debug!("Found {} candidate report links", links.len());
        Ok(links)
    }
}
