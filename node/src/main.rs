//! ChainPulse - rolling-window block statistics daemon
//!
//! Polls a ledger node over JSON-RPC and publishes throughput statistics
//! aggregated over a trailing window of blocks.
//!
//! Usage:
//!   chainpulse --config chainpulse.toml
//!
//! The daemon will:
//! - Poll the configured node and follow its frontier block
//! - Aggregate fixed-window and time-window throughput statistics
//! - Serve readiness, the last snapshot, and metrics over loopback HTTP
//! - Run until Ctrl+C is received

mod http;
mod metrics;

use anyhow::{Context, Result};
use chainpulse_config::{LoggingConfig, MonitorConfig};
use chainpulse_rpc_client::RpcClient;
use chainpulse_stats::{
    BlockSource, BroadcastPublisher, Collector, LogPublisher, MultiPublisher, Publisher,
};
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

/// Interval between runtime metrics refreshes.
const METRICS_REFRESH: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(
    name = "chainpulse",
    about = "Rolling-window block statistics daemon",
    version
)]
struct Cli {
    /// Path to the TOML configuration file (created with defaults if missing).
    #[arg(
        long,
        short = 'c',
        default_value = "chainpulse.toml",
        env = "CHAINPULSE_CONFIG",
        value_name = "PATH"
    )]
    config: PathBuf,

    /// Overrides the JSON-RPC endpoint to poll.
    #[arg(long, value_name = "URL", env = "CHAINPULSE_RPC_URL")]
    rpc_url: Option<String>,

    /// Overrides the fixed window size in blocks.
    #[arg(long, value_name = "BLOCKS", env = "CHAINPULSE_WINDOW_BLOCKS")]
    window_blocks: Option<u64>,

    /// Overrides the fixed-window poll interval in milliseconds.
    #[arg(long, value_name = "MS", env = "CHAINPULSE_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Overrides the time window span in seconds.
    #[arg(long, value_name = "SECONDS", env = "CHAINPULSE_TIME_WINDOW_SECS")]
    time_window_secs: Option<u64>,

    /// Overrides the HTTP surface port.
    #[arg(long, value_name = "PORT", env = "CHAINPULSE_HTTP_PORT")]
    http_port: Option<u16>,

    /// Override logging level.
    #[arg(long, value_name = "LEVEL", env = "CHAINPULSE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Override logging format (json, pretty).
    #[arg(long, value_name = "FORMAT", env = "CHAINPULSE_LOG_FORMAT")]
    log_format: Option<String>,

    /// Write logs to this file or directory.
    #[arg(long, value_name = "PATH", env = "CHAINPULSE_LOG_PATH")]
    log_path: Option<PathBuf>,

    /// Run in daemon mode (no console output).
    #[arg(long, short = 'd', env = "CHAINPULSE_DAEMON")]
    daemon: bool,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = MonitorConfig::load_or_create(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    apply_cli_overrides(&mut config, &cli);

    let logging_handles = init_tracing(&config.logging, cli.daemon)?;
    let _log_guard = logging_handles.guard;

    config.validate()?;

    if cli.check_config {
        info!(target: "chainpulse", "configuration validated; exiting due to --check-config");
        return Ok(());
    }

    let endpoint = Url::parse(&config.source.rpc_url)
        .with_context(|| format!("invalid rpc url '{}'", config.source.rpc_url))?;
    let client = RpcClient::new(endpoint.clone(), config.source.request_timeout())
        .context("failed to build rpc client")?;
    let source: Arc<dyn BlockSource> = Arc::new(client);

    let broadcast = Arc::new(BroadcastPublisher::new(config.publish.broadcast_capacity));
    let publisher: Arc<dyn Publisher> = Arc::new(MultiPublisher::new(vec![
        Arc::clone(&broadcast) as Arc<dyn Publisher>,
        Arc::new(LogPublisher),
        Arc::new(metrics::MetricsPublisher),
    ]));

    let collector = Arc::new(Collector::new(&config, source, publisher));

    if config.fixed_window.enabled {
        tokio::spawn(Arc::clone(&collector).run_fixed());
        info!(
            target: "chainpulse",
            window_blocks = config.fixed_window.window_blocks,
            poll_ms = config.fixed_window.poll_interval_ms,
            "fixed window cycle scheduled"
        );
    }
    if config.time_window.enabled {
        tokio::spawn(Arc::clone(&collector).run_time_window());
        info!(
            target: "chainpulse",
            window_secs = config.time_window.window_secs,
            poll_ms = config.time_window.poll_interval_ms,
            "time window cycle scheduled"
        );
    }

    if config.http.enabled {
        let addr = config.http_addr();
        let state = Arc::clone(collector.state());
        tokio::spawn(async move {
            if let Err(err) = http::serve(addr, state).await {
                warn!(target: "chainpulse", error = %err, "http server terminated");
            }
        });
        info!(target: "chainpulse", %addr, "http surface listening");
    }

    {
        let collector = Arc::clone(&collector);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(METRICS_REFRESH);
            loop {
                ticker.tick().await;
                metrics::update_runtime(collector.state(), collector.fetcher());
            }
        });
    }

    info!(
        target: "chainpulse",
        endpoint = %endpoint,
        "chainpulse started; press Ctrl+C to stop"
    );

    if let Err(err) = signal::ctrl_c().await {
        error!(target: "chainpulse", error = %err, "failed to wait for shutdown signal");
    } else {
        info!(target: "chainpulse", "shutdown signal received (Ctrl+C)");
    }
    info!(target: "chainpulse", "shutdown complete");
    Ok(())
}

fn apply_cli_overrides(config: &mut MonitorConfig, cli: &Cli) {
    if let Some(url) = &cli.rpc_url {
        config.source.rpc_url = url.clone();
    }
    if let Some(blocks) = cli.window_blocks {
        config.fixed_window.window_blocks = blocks;
    }
    if let Some(interval) = cli.poll_interval_ms {
        config.fixed_window.poll_interval_ms = interval;
    }
    if let Some(secs) = cli.time_window_secs {
        config.time_window.window_secs = secs;
    }
    if let Some(port) = cli.http_port {
        config.http.port = port;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
    if let Some(path) = &cli.log_path {
        config.logging.log_to_file = true;
        config.logging.log_file = Some(path.clone());
    }
}

struct LoggingHandles {
    guard: Option<WorkerGuard>,
}

fn init_tracing(logging: &LoggingConfig, daemon_mode: bool) -> Result<LoggingHandles> {
    use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

    let level = logging.level.as_str();
    let filter_spec = format!("{level},chainpulse={level}");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_spec));

    let mut guard = None;
    let file_writer = if logging.log_to_file {
        let path = logging
            .log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("logs"));
        let (writer, file_guard) = create_file_writer(&path)?;
        guard = Some(file_guard);
        Some(writer)
    } else {
        None
    };

    let has_file = file_writer.is_some();
    let console_enabled = !daemon_mode;

    let writer: BoxMakeWriter = match (file_writer, console_enabled) {
        (Some(file), true) => BoxMakeWriter::new(io::stderr.and(file)),
        (Some(file), false) => BoxMakeWriter::new(file),
        (None, true) => BoxMakeWriter::new(io::stderr),
        (None, false) => BoxMakeWriter::new(io::sink),
    };

    let builder = fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(console_enabled && !has_file);

    match logging.format.to_ascii_lowercase().as_str() {
        "json" => {
            let _ = builder.json().try_init();
        }
        _ => {
            let _ = builder.pretty().try_init();
        }
    }
    Ok(LoggingHandles { guard })
}

fn create_file_writer(path: &Path) -> Result<(non_blocking::NonBlocking, WorkerGuard)> {
    let file_path = if path.is_file() || path.extension().is_some() {
        path.to_path_buf()
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create log directory {}", path.display()))?;
        path.join("chainpulse.log")
    };

    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&file_path)
        .with_context(|| format!("failed to open log file {}", file_path.display()))?;
    Ok(non_blocking(file))
}
