// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job Daemon (jobsd)
//!
//! Background process that owns the event bus, the schedules and the
//! worker pool.

use std::path::PathBuf;

use clap::Parser;
use jobs_daemon::{check, startup, DaemonConfig, LifecycleError};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "jobsd", version, about = "Job scheduling daemon")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and jobs file, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config = DaemonConfig::load(args.config.as_deref())?;

    if args.check {
        let jobs = check(&config)?;
        println!("ok: {jobs} jobs");
        return Ok(());
    }

    // Write startup marker to log (before tracing setup, so tooling can find it)
    write_startup_marker(&config)?;

    // Set up logging
    let log_guard = setup_logging(&config)?;

    info!("Starting jobsd in {}", config.data_dir.display());

    // Start daemon
    let mut daemon = match startup(&config).await {
        Ok(d) => d,
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let Some(events) = daemon.take_events() else {
        return Err("runtime subscription already taken".into());
    };
    let runtime = daemon.runtime.clone();
    let mut event_loop = tokio::spawn(async move { runtime.run(events).await });

    info!("Daemon ready");

    // Signal ready for parent process (e.g., systemd, scripts waiting for startup)
    println!("READY");

    tokio::select! {
        // Graceful shutdown on SIGTERM
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }

        // Graceful shutdown on SIGINT
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
        }

        result = &mut event_loop => {
            if let Err(e) = result {
                error!("Event loop failed: {}", e);
            } else {
                warn!("Event loop ended unexpectedly");
            }
        }
    }

    daemon.shutdown().await?;
    if !event_loop.is_finished() {
        event_loop.abort();
    }

    info!("Daemon stopped");
    Ok(())
}

/// Startup marker prefix written to log before anything else.
/// Full format: "--- jobsd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- jobsd: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(config: &DaemonConfig) -> Result<(), LifecycleError> {
    use std::io::Write;

    let log_path = config.log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file.
fn write_startup_error(config: &DaemonConfig, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    config: &DaemonConfig,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = config.log_path();
    let dir = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let Some(file_name) = log_path.file_name() else {
        return Err(LifecycleError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("log path has no file name: {}", log_path.display()),
        )));
    };

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
