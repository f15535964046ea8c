use std::ffi::OsStr;
use std::path::Path;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, instrument};
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use node_price_reports::config::{Config, ConfigError, SourceConfig};
use node_price_reports::date_range::parse_internal_date;
use node_price_reports::pipeline::{run_batch, ReportSource};
use node_price_reports::reports::FetchOutcome;

#[derive(Parser)]
#[command(name = "node-price-reports")]
#[command(about = "Download daily node price reports and average a price column per date", long_about = None)]
struct Cli {
    /// First date of the range (DD-MM-YYYY)
    #[arg(long, global = true, env = "START_DATE", value_parser = parse_date_arg)]
    start_date: Option<NaiveDate>,

    /// Last date of the range (DD-MM-YYYY)
    #[arg(long, global = true, env = "END_DATE", value_parser = parse_date_arg)]
    end_date: Option<NaiveDate>,

    /// Price zone code (e.g. eur, sib)
    #[arg(long, global = true, env = "PRICE_ZONE")]
    price_zone: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Download every report in the date range, aggregate and export (default)
    Batch,
    /// Print the report link for one date; any failure is fatal.
    /// Needs no TARGET_REGION or PRICE_FOR_CALCULATED
    Resolve {
        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,
        #[arg(long)]
        region: Option<String>,
    },
    /// Download the report for one date; any failure is fatal.
    /// Needs no TARGET_REGION or PRICE_FOR_CALCULATED
    Fetch {
        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,
        #[arg(long)]
        region: Option<String>,
    },
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_internal_date(value).map_err(|e| format!("expected DD-MM-YYYY: {e}"))
}

/// Appender writing to exactly `log_file`; a bare file name lands in the working directory
fn log_file_appender(log_file: &str) -> RollingFileAppender {
    let path = Path::new(log_file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = path.file_name().unwrap_or(OsStr::new("reports.log"));
    tracing_appender::rolling::never(dir, name)
}

fn required_arg<T>(value: Option<T>, name: &str) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::Missing(name.to_string()))
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Console output plus the LOG_FILE log
    let log_file = std::env::var("LOG_FILE").unwrap_or_else(|_| "reports.log".to_string());
    let file_appender = log_file_appender(&log_file);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,node_price_reports=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking_file),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Batch) {
        Command::Batch => {
            let config = Config::from_env_with(
                required_arg(cli.start_date, "START_DATE")?,
                required_arg(cli.end_date, "END_DATE")?,
                required_arg(cli.price_zone, "PRICE_ZONE")?,
            )?;
            info!("Loaded configuration: {:?}", config);

            let summary = run_batch(&config).await?;

            println!("\n============================================================");
            println!("Average {} for {}", config.price_column, config.target_region);
            println!("============================================================");
            for row in &summary.table.rows {
                match row.value {
                    Some(value) => println!("{}  {value:.2}", row.display_date()),
                    None => println!("{}  -", row.display_date()),
                }
            }
            println!("------------------------------------------------------------");
            println!("Downloaded:         {}", summary.downloaded);
            println!("Already present:    {}", summary.skipped);
            println!("Failed:             {}", summary.failed.len());
            println!("CSV:                {}", summary.outputs.csv.display());
            println!("Spreadsheet:        {}", summary.outputs.xlsx.display());
            println!("XML:                {}", summary.outputs.xml.display());
            println!("============================================================");

            if !summary.failed.is_empty() {
                println!("\nFailed dates:");
                for (date, error) in &summary.failed {
                    println!("  {date}: {error}");
                }
            }
        }
        Command::Resolve { date, region } => {
            let region = required_arg(region.or(cli.price_zone), "PRICE_ZONE")?;
            let config = SourceConfig::from_env()?;
            info!("Loaded configuration: {:?}", config);
            let source = ReportSource::from_source_config(&config)?;
            let link = source.resolve(date, &region).await?;
            println!("{}", link.url);
        }
        Command::Fetch { date, region } => {
            let region = required_arg(region.or(cli.price_zone), "PRICE_ZONE")?;
            let config = SourceConfig::from_env()?;
            info!("Loaded configuration: {:?}", config);
            let source = ReportSource::from_source_config(&config)?;
            let path = source.report_path(&region, date);
            match source.fetch_date(date, &region).await? {
                FetchOutcome::Downloaded { bytes } => {
                    println!("Downloaded {bytes} bytes to {}", path.display())
                }
                FetchOutcome::Skipped => println!("Already present: {}", path.display()),
            }
        }
    }

    Ok(())
}
