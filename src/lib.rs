pub mod config;
pub mod date_range;
pub mod fetch_error;
pub mod http_client;
pub mod link_resolver;
pub mod pipeline;
pub mod reports;
