//! CLI entry point for the GTFS-RT ingestion job.
//!
//! `run` performs one invocation: every configured feed is fetched, decoded,
//! converted to JSONL and written to S3. The scheduler reads the exit code
//! (0 healthy, 2 partial, 1 total outage) and the JSON result on stdout.

use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gtfs_rt_ingest::batch::run;
use gtfs_rt_ingest::config::Config;
use gtfs_rt_ingest::fetch::{BasicClient, fetch_bytes};
use gtfs_rt_ingest::keys::FetchStamp;
use gtfs_rt_ingest::parser::{header_timestamp, parse_feed};
use gtfs_rt_ingest::records::{to_jsonl, to_records};
use gtfs_rt_ingest::storage::S3Store;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_rt_ingest")]
#[command(about = "Ingests GTFS-RT feeds into S3 as JSONL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every configured feed once and write it to S3
    Run,
    /// Decode a GTFS-RT feed from a file or URL and print its JSONL records
    Decode {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Feed type recorded in each line
        #[arg(short, long, default_value = "feed")]
        feed_type: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    let _file_guard = init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_once().await,
        Commands::Decode { source, feed_type } => {
            decode(&source, &feed_type).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Colored stderr plus a JSON rolling log file. When the log file cannot be
/// opened the job still runs with stderr logging only.
fn init_tracing() -> Option<WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_rt_ingest.log".to_string());

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(LevelFilter::INFO.into()));

    let (json_layer, guard, file_error) = match open_log_file(Path::new(&log_file_path)) {
        Ok((writer, guard)) => {
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(writer)
                .with_filter(
                    EnvFilter::from_env("RUST_LOG_JSON").add_directive(LevelFilter::DEBUG.into()),
                );
            (Some(layer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    if let Some(e) = file_error {
        warn!(path = %log_file_path, error = %e, "File logging disabled");
    }

    guard
}

fn open_log_file(path: &Path) -> Result<(NonBlocking, WorkerGuard), InitError> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let prefix = path
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or("gtfs_rt_ingest.log");

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .build(dir)?;
    Ok(tracing_appender::non_blocking(appender))
}

#[tracing::instrument]
async fn run_once() -> Result<ExitCode> {
    let cfg = Config::from_env().inspect_err(|e| error!(error = %e, "Invalid configuration"))?;
    info!(
        bucket = %cfg.bucket,
        prefix = %cfg.prefix,
        timeout_seconds = cfg.timeout_seconds,
        feeds = ?cfg.urls.keys().collect::<Vec<_>>(),
        "Configuration loaded"
    );

    let client = BasicClient::new()?;
    let store = S3Store::from_env(cfg.storage_timeout()).await;

    let result = run(&cfg, &client, &store).await;
    let response = result.to_response()?;
    println!("{}", serde_json::to_string(&response)?);

    Ok(ExitCode::from(result.status().exit_code()))
}

/// Loads feed data from a local file path or fetches it over HTTP, then
/// prints the records that `run` would store.
#[tracing::instrument(skip_all, fields(source = %source, feed_type = %feed_type))]
async fn decode(source: &str, feed_type: &str) -> Result<()> {
    let bytes = if source.starts_with("http") {
        let client = BasicClient::new()?;
        let timeout = Config::from_env()?.http_timeout();
        fetch_bytes(&client, source, timeout).await?.to_vec()
    } else {
        std::fs::read(source)?
    };

    let feed = parse_feed(&bytes)?;
    let stamp = FetchStamp::now();
    let body = to_jsonl(to_records(
        feed_type,
        &feed.entity,
        &stamp.fetch_ts,
        header_timestamp(&feed),
    ))?;

    info!(
        entities = feed.entity.len(),
        pb_bytes = bytes.len(),
        jsonl_bytes = body.len(),
        "Feed decoded"
    );

    std::io::stdout().write_all(&body)?;
    Ok(())
}
