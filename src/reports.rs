//! Report download, per-date aggregation and summary export

pub mod aggregator;
pub mod downloader;
pub mod export;

// Re-export commonly used items
pub use aggregator::{AggregateRow, AggregateTable, Aggregator, ReportFile};
pub use downloader::{FetchOutcome, ReportDownloader};
pub use export::ExportPaths;
