//! livescan - scan one code from a replayed camera capture
//!
//! Replays a capture file as a live camera, runs a single scan session and
//! prints the decoded payload to stdout. Logs go to stderr.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use livescan::{ChannelObserver, Config, MarkerDecoder, ReplayDevice, ScanDriver, ScanState, ScanUpdate};

/// Exit code when no code was scanned before the scan stopped
const EXIT_CODE_NOT_FOUND: i32 = 1;

/// Exit code when the camera could not be acquired
const EXIT_CODE_DENIED: i32 = 2;

/// Exit code for Ctrl+C (128 + SIGINT)
const EXIT_CODE_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("===========================================");
    info!("   livescan - live code scanner");
    info!("===========================================");

    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Configuration:");
    info!("  Source: {}", config.source.display());
    info!("  Tick: {} ms", config.tick_ms);
    info!("  Replay: {} fps{}", config.fps, if config.looping { " (looping)" } else { "" });
    info!("  Facing: {} ({}x{})", config.facing, config.width, config.height);
    match config.timeout_ms {
        Some(ms) => info!("  Timeout: {} ms", ms),
        None => info!("  Timeout: none"),
    }

    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel::<ScanUpdate>();
    let driver = ScanDriver::new(
        config.driver_config(),
        ReplayDevice::new(config.replay_config()),
        MarkerDecoder::new(config.max_payload),
        ChannelObserver::new(updates_tx),
    );
    let stats = driver.stats().clone();

    // Ctrl+C tears the session down through the same stop path as a caller
    let interrupted = Arc::new(AtomicBool::new(false));
    let stop = driver.stop_handle();
    let flag = interrupted.clone();
    let signal_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted. Cleaning up...");
                flag.store(true, Ordering::SeqCst);
                stop.stop();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    let updates_handle = tokio::spawn(async move {
        while let Some(update) = updates_rx.recv().await {
            match update {
                ScanUpdate::State { state, timestamp_ms } => {
                    info!("[{}] Scanner {}", timestamp_ms, state);
                }
                ScanUpdate::Result { payload, timestamp_ms } => {
                    info!("[{}] Code scanned ({} bytes)", timestamp_ms, payload.as_str().len());
                }
            }
        }
    });

    let outcome = driver.run().await?;
    signal_handle.abort();
    if let Err(e) = updates_handle.await {
        error!("Update logger failed: {}", e);
    }

    info!("[Stats] {}", stats);

    let code = match outcome.state {
        ScanState::Found => {
            if let Some(payload) = &outcome.payload {
                println!("{}", payload);
            }
            return Ok(());
        }
        ScanState::PermissionDenied => {
            if let Some(denial) = &outcome.denial {
                error!("Camera not available: {}", denial);
            }
            EXIT_CODE_DENIED
        }
        _ if interrupted.load(Ordering::SeqCst) => EXIT_CODE_INTERRUPTED,
        _ => {
            warn!("No code scanned ({:?})", outcome.stop_reason);
            EXIT_CODE_NOT_FOUND
        }
    };

    std::process::exit(code);
}
