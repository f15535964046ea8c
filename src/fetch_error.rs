#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to load page {url}: status {status}")]
    Status { url: String, status: u16 },
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("No report link found on {url}")]
    LinkNotFound { url: String },
    #[error("Found {count} report links on {url}, expected exactly one")]
    LinkAmbiguous { url: String, count: usize },
}
