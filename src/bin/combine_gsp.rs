use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use combined_gsp::{
    default_cache_dir, CollectorConfig, CombineError, Granularity, GspCollector, PvLiveClient,
    RetryPolicy, TimeWindow, DEFAULT_BASE_URL, DEFAULT_MAX_REQUEST_DAYS, DEFAULT_MAX_SITE_ID,
    DEFAULT_TIME_CHUNK, DEFAULT_WORKERS,
};

#[derive(Parser)]
#[command(name = "combine-gsp")]
#[command(about = "Combine PVLive generation for every GSP into one Zarr dataset")]
#[command(version)]
struct Cli {
    /// First year of the window (inclusive, from 1 January).
    #[arg(long, default_value_t = 2020)]
    start_year: i32,

    /// Last year of the window (exclusive, up to 1 January).
    #[arg(long, default_value_t = 2025)]
    end_year: i32,

    #[arg(long, default_value = "data")]
    output_folder: PathBuf,

    #[arg(long, default_value_t = DEFAULT_MAX_SITE_ID)]
    max_gsp_id: i64,

    /// Concurrent site fetches.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    #[arg(long, default_value_t = 30)]
    granularity_minutes: i64,

    #[arg(long, default_value_t = DEFAULT_TIME_CHUNK)]
    time_chunk: u64,

    #[arg(long, default_value_t = DEFAULT_MAX_REQUEST_DAYS)]
    max_request_days: i64,

    /// Per-request timeout.
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    #[arg(long, default_value_t = 500)]
    retry_base_ms: u64,

    /// Upper bound on the backoff between attempts.
    #[arg(long, default_value_t = 10_000)]
    retry_max_ms: u64,

    /// Where upstream responses are cached; defaults to the user cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[arg(long)]
    no_cache: bool,

    #[arg(long, env = "PVLIVE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

impl Cli {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.retry_base_ms),
            max_delay: Duration::from_millis(self.retry_max_ms),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    match run(cli, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::from(map_exit_code(&err))
        }
    }
}

async fn run(cli: Cli, cancel: &CancellationToken) -> Result<(), CombineError> {
    let window = TimeWindow::from_years(cli.start_year, cli.end_year)?;
    let granularity = Granularity::from_minutes(cli.granularity_minutes)?;
    let cache_dir = match (cli.no_cache, cli.cache_dir.clone()) {
        (true, _) => None,
        (false, Some(dir)) => Some(dir),
        (false, None) => Some(default_cache_dir()?),
    };
    let retry = cli.retry_policy();

    let source = PvLiveClient::new(cli.base_url, Duration::from_secs(cli.timeout_secs))?;
    let config = CollectorConfig::builder()
        .window(window)
        .output_dir(cli.output_folder)
        .max_site_id(cli.max_gsp_id)
        .workers(cli.workers)
        .granularity(granularity)
        .time_chunk(cli.time_chunk)
        .max_request_days(cli.max_request_days)
        .retry(retry)
        .maybe_cache_dir(cache_dir)
        .build();

    let summary = GspCollector::new(source, config)?.run(cancel).await?;
    for (site, reason) in &summary.skip_report {
        log::info!("Skipped GSP {}: {}", site, reason);
    }
    println!("{}", summary.output_path.display());
    Ok(())
}

fn map_exit_code(error: &CombineError) -> u8 {
    match error {
        CombineError::Config(_) => 2,
        CombineError::Fetch(_) => 3,
        CombineError::Write(_) => 4,
        CombineError::NoData { .. } => 5,
        CombineError::Cancelled => 130,
    }
}
