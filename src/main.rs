//! CLI entry point for the weather pipeline.
//!
//! `ingest` fetches the hourly archive, backs it up to the object store and
//! announces new records; `dashboard` loads the backup and prints headline
//! metrics; `normalize` cleans a local CSV.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use weather_pipeline::config::{Settings, default_date_range};
use weather_pipeline::dashboard::{DashboardState, DataSource, RenderOptions, render};
use weather_pipeline::fetch::{BasicClient, HourlyRequest, OpenMeteoClient};
use weather_pipeline::notify::{LogPublisher, Publisher, SnsPublisher};
use weather_pipeline::output::{write_prepared, write_series_file};
use weather_pipeline::parser::parse_table;
use weather_pipeline::pipeline::{IngestTarget, run_ingest};
use weather_pipeline::store::{FsObjectStore, ObjectStore, S3ObjectStore};
use weather_pipeline::{Measurement, normalize};

#[derive(Parser)]
#[command(name = "weather_pipeline")]
#[command(about = "Hourly weather ingestion and dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch hourly observations, upload the CSV backup and announce new records
    Ingest {
        #[arg(long, allow_negative_numbers = true)]
        latitude: Option<f64>,

        #[arg(long, allow_negative_numbers = true)]
        longitude: Option<f64>,

        /// First day to fetch (default: Jan 1 of the current year)
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Last day to fetch (default: yesterday)
        #[arg(long)]
        end_date: Option<NaiveDate>,

        /// Local copy of the CSV backup
        #[arg(short, long, default_value = "weather_backup.csv")]
        output: PathBuf,

        /// Bucket to upload to (default: WEATHER_BUCKET)
        #[arg(long)]
        bucket: Option<String>,

        /// Object key (default: WEATHER_OBJECT_KEY)
        #[arg(long)]
        key: Option<String>,

        /// Gzip compress the CSV before uploading
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// SNS topic ARN for announcements (default: WEATHER_TOPIC_ARN)
        #[arg(long)]
        topic: Option<String>,

        /// Do not announce records even if a topic is configured
        #[arg(long, default_value_t = false)]
        no_publish: bool,

        /// Use a local directory as object store instead of S3
        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// HTTP timeout in seconds
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },
    /// Load the CSV backup and print the dashboard
    Dashboard {
        /// Read a local CSV instead of the object store
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(long)]
        bucket: Option<String>,

        #[arg(long)]
        key: Option<String>,

        /// Use a local directory as object store instead of S3
        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Metric to summarize
        #[arg(short, long, default_value = "temperature_2m")]
        metric: Measurement,

        /// Number of recent rows to show
        #[arg(short = 'n', long, default_value_t = 20)]
        recent: usize,

        /// Write the prepared series with the rolling column to this CSV
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Drop fully empty rows from a local CSV
    Normalize {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(short, long, default_value = "weather_clean.csv")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/weather_pipeline.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("weather_pipeline.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Ingest {
            latitude,
            longitude,
            start_date,
            end_date,
            output,
            bucket,
            key,
            gzip,
            topic,
            no_publish,
            store_dir,
            timeout,
        } => {
            let (default_start, default_end) = default_date_range(Local::now().date_naive());
            let request = HourlyRequest {
                latitude: latitude.unwrap_or(settings.latitude),
                longitude: longitude.unwrap_or(settings.longitude),
                start_date: start_date.unwrap_or(default_start),
                end_date: end_date.unwrap_or(default_end),
                variables: Measurement::ALL.to_vec(),
                timezone: settings.timezone,
            };
            if request.start_date > request.end_date {
                anyhow::bail!(
                    "start date {} is after end date {}",
                    request.start_date,
                    request.end_date
                );
            }

            let target = IngestTarget {
                local_path: Some(output),
                bucket: bucket.unwrap_or(settings.bucket),
                key: key.unwrap_or(settings.object_key),
                gzip,
                topic: if no_publish { None } else { topic.or(settings.topic) },
            };

            let api = OpenMeteoClient::new(BasicClient::with_timeout(Duration::from_secs(timeout))?);
            let offline = store_dir.is_some();
            let store = object_store(store_dir).await;
            let publisher: Option<Box<dyn Publisher>> = match &target.topic {
                Some(_) if offline => Some(Box::new(LogPublisher)),
                Some(_) => Some(Box::new(SnsPublisher::from_env().await)),
                None => None,
            };

            let report = run_ingest(&api, store.as_ref(), publisher.as_deref(), &request, &target)
                .await
                .context("ingest run failed")?;

            info!(
                fetched = report.fetched,
                retained = report.retained,
                dropped = report.dropped(),
                key = %report.object_key,
                published = report.published,
                "Ingest complete"
            );
        }
        Commands::Dashboard {
            file,
            bucket,
            key,
            store_dir,
            metric,
            recent,
            export,
        } => {
            let source = match file {
                Some(path) => DataSource::Local(path),
                None => DataSource::Remote {
                    bucket: bucket.unwrap_or(settings.bucket),
                    key: key.unwrap_or(settings.object_key),
                },
            };
            let store = object_store(store_dir).await;

            let mut state = DashboardState::new(source, settings.timezone);
            state
                .load(store.as_ref(), false)
                .await
                .context("failed to load weather data")?;

            let Some(view) = state.view()? else {
                warn!("Nothing loaded");
                return Ok(());
            };

            let options = RenderOptions {
                metric,
                recent_rows: recent,
            };
            let mut stdout = std::io::stdout().lock();
            render(&view, &options, &mut stdout)?;

            if let (Some(path), Some(prepared)) = (export, &view.prepared) {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("creating {}", path.display()))?;
                write_prepared(prepared, file)?;
                info!(path = %path.display(), "Prepared series exported");
            }
        }
        Commands::Normalize { input, output } => {
            let bytes = std::fs::read(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let records = parse_table(&bytes)?.to_records()?;
            let total = records.len();
            let series = normalize(records);

            write_series_file(&output, &series)?;
            info!(total, retained = series.len(), output = %output.display(), "Normalized");
        }
    }

    Ok(())
}

/// S3 unless a local store directory was given.
async fn object_store(store_dir: Option<PathBuf>) -> Box<dyn ObjectStore> {
    match store_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "Using local object store");
            Box::new(FsObjectStore::new(dir))
        }
        None => Box::new(S3ObjectStore::from_env().await),
    }
}
