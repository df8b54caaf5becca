//! Headless visualiser: listen, decode, optionally record or replay, and log
//! what the display would show.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sdpvis::capture::default_file_name;
use sdpvis::{
    CaptureFormat, LiveConnection, ReplaySpeed, SimulationMode, StoreHandle, VisualiserConfig,
};

/// Receive SpiNNaker SDP telemetry and report the display state
#[derive(Parser, Debug)]
#[command(name = "sdpvis", version, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulation mode, overriding the configuration (e.g. heat_map, cpu_util)
    #[arg(short, long, value_parser = parse_mode)]
    mode: Option<SimulationMode>,

    /// UDP port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Only accept the board at this address
    #[arg(short, long)]
    board: Option<IpAddr>,

    /// Replay a raw capture into the listener
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Replay speed multiplier
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Record incoming traffic to this file, or to a timestamped file in this directory
    #[arg(long)]
    capture: Option<PathBuf>,

    /// Record spikes in NeuroTools format instead of raw datagrams
    #[arg(long, default_value_t = false)]
    spikes: bool,

    /// Seconds between display summaries
    #[arg(long, default_value_t = 5)]
    summary_secs: u64,

    /// Exit after this many seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: String,
}

fn parse_mode(value: &str) -> std::result::Result<SimulationMode, String> {
    serde_yaml_ng::from_str(value).map_err(|e| format!("unknown simulation mode '{value}': {e}"))
}

fn capture_path(path: &Path, format: CaptureFormat) -> PathBuf {
    if path.is_dir() {
        path.join(default_file_name(format, &chrono::Local::now()))
    } else {
        path.to_path_buf()
    }
}

fn log_summary(store: &StoreHandle, connection: &LiveConnection) {
    let view = store.view();
    let stats = connection.stats();
    info!(
        frames = stats.frames,
        malformed = stats.malformed,
        defined = view.defined_cells(),
        cells = view.snapshot.len(),
        high = view.watermarks.high,
        low = view.watermarks.low,
        frozen = view.frozen,
        "Display summary"
    );
    if let Some((first, last)) = view.spike_range {
        info!(first, last, "Neurons seen firing");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &args.config {
        Some(path) => VisualiserConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => VisualiserConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(port) = args.port {
        config.sdp_port = port;
    }
    if args.board.is_some() {
        config.board_address = args.board;
    }
    config.validate().context("invalid configuration")?;

    let connection = LiveConnection::start(&config)
        .await
        .with_context(|| format!("listening on port {}", config.sdp_port))?;
    info!(title = %config.title, port = config.sdp_port, "Visualiser listening");

    if let Some(path) = &args.capture {
        let format = if args.spikes { CaptureFormat::NeuroTools } else { CaptureFormat::Raw };
        let path = capture_path(path, format);
        connection
            .start_capture(format, &path)
            .with_context(|| format!("starting capture at {}", path.display()))?;
        info!(path = %path.display(), ?format, "Capturing");
    }

    let replay = match &args.replay {
        Some(path) => Some(
            connection
                .replay(path, ReplaySpeed::new(args.speed))
                .await
                .with_context(|| format!("replaying {}", path.display()))?,
        ),
        None => None,
    };

    let store = connection.store().clone();
    let mut summary = tokio::time::interval(Duration::from_secs(args.summary_secs.max(1)));
    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for ctrl-c: {}", e);
                }
                info!("Interrupted");
                break;
            }
            _ = &mut deadline => {
                info!("Run time elapsed");
                break;
            }
            _ = summary.tick() => log_summary(&store, &connection),
        }
    }

    if let Some(replay) = replay {
        replay.stop();
        match replay.wait().await {
            Ok(result) => info!(sent = result.sent, late = result.late, "Replay finished"),
            Err(e) => warn!("Replay failed: {}", e),
        }
    }

    let shutdown = connection.shutdown().await.context("shutting down")?;
    log_summary(&store, &connection);
    if let Some(capture) = shutdown.capture {
        info!(records = capture.records, dropped = capture.dropped, "Capture closed");
    }
    Ok(())
}
