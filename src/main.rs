use anyhow::Result;
use clap::Parser;
use failwatch::config::{Config, LogFormat};
use failwatch::metrics;
use failwatch::monitors::FollowError;
use failwatch::pipeline::{Pipeline, RunOutcome};
use failwatch::response::ResponseHandler;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

const EXIT_CONFIG: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "failwatch", version)]
#[command(about = "Follow auth logs and alert on bursts of failed logins from one IP")]
struct Args {
    /// Log files to follow (defaults to the bundled sample log)
    logfiles: Vec<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Failed attempts within the window that raise an alert
    #[arg(short, long, env = "FAILWATCH_THRESHOLD")]
    threshold: Option<usize>,

    /// Sliding window length in seconds
    #[arg(short, long, env = "FAILWATCH_WINDOW")]
    window: Option<u64>,

    /// Poll interval in milliseconds when a log has no new data
    #[arg(long, env = "FAILWATCH_POLL_MS")]
    poll_interval_ms: Option<u64>,

    /// Print alerts as JSON objects
    #[arg(long)]
    json: bool,

    /// Emit diagnostic logs (stderr) as JSON
    #[arg(long)]
    log_json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Serve health and Prometheus metrics on this address
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,
}

fn init_tracing(verbose: u8, json: bool) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        subscriber.json().init();
    } else {
        subscriber.with_target(false).init();
    }
}

/// Layer CLI flags and environment over the config file and defaults.
fn build_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if !args.logfiles.is_empty() {
        config.general.log_paths = args.logfiles.clone();
    }
    if let Some(threshold) = args.threshold {
        config.detection.threshold = threshold;
    }
    if let Some(window) = args.window {
        config.detection.window_secs = window;
    }
    if let Some(poll) = args.poll_interval_ms {
        config.follower.poll_interval_ms = poll;
    }
    if args.json {
        config.general.alert_format = LogFormat::Json;
    }

    config.validate()?;
    Ok(config)
}

/// Resolve on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to set up SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

async fn run(config: Config, metrics_addr: Option<SocketAddr>) -> ExitCode {
    let followers = match Pipeline::open_followers(&config.general.log_paths, &config.follower).await {
        Ok(followers) => followers,
        Err(FollowError::NotFound { path }) => {
            println!("Log file not found: {}", path.display());
            println!("Create the file and append lines matching failed login patterns to test.");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    for path in &config.general.log_paths {
        println!(
            "Watching {} (threshold={} in {}s)",
            path.display(),
            config.detection.threshold,
            config.detection.window_secs
        );
    }

    let (ready_tx, ready_rx) = watch::channel(false);
    if let Some(addr) = metrics_addr {
        tokio::spawn(async move {
            metrics::start_server(addr, ready_rx).await;
        });
        info!("Metrics available at http://{}/metrics", addr);
    }

    let (alert_tx, alert_rx) = mpsc::channel(100);
    let response_handler = ResponseHandler::new(config.general.alert_format);
    let response_handle = tokio::spawn(async move {
        response_handler.run(alert_rx).await;
    });

    let _ = ready_tx.send(true);
    info!("failwatch running. Press Ctrl+C to stop.");

    let outcome = Pipeline::new(&config)
        .run(followers, alert_tx, shutdown_signal())
        .await;

    let _ = ready_tx.send(false);
    // The pipeline dropped its sender; let queued alerts print.
    let _ = response_handle.await;

    match outcome {
        Ok(RunOutcome::Interrupted) => {
            println!("Exiting");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::SourcesClosed) => {
            info!("All log sources closed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Stopped: {}", e);
            eprintln!("failwatch: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose, args.log_json);

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failwatch: invalid configuration: {:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    run(config, args.metrics_addr).await
}
