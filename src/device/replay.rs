//! Replay device - plays back a capture file as a live frame source
//!
//! Each non-empty line of the capture file is one frame. A dedicated reader
//! thread paces the frames at the configured rate and pushes them into a
//! bounded channel; polling is a non-blocking `try_recv`, so the device
//! behaves like a camera that may or may not have a frame ready.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{AccessError, AccessFuture, Constraints, Device, DeviceError, Frame};

/// Replay source configuration
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub path: PathBuf,
    pub frames_per_second: u32,
    pub looping: bool,
    pub buffer_frames: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("frames.txt"),
            frames_per_second: 30,
            looping: false,
            buffer_frames: 8,
        }
    }
}

impl ReplayConfig {
    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frames_per_second.max(1) as f64)
    }
}

/// Granted access to a replay source
///
/// Dropping the handle stops the reader thread, so a handle that never
/// reaches [`Device::release`] still frees the source.
pub struct ReplayHandle {
    frames: Receiver<Frame>,
    running: Arc<AtomicBool>,
    exhausted: bool,
}

impl ReplayHandle {
    fn spawn(config: ReplayConfig, lines: Vec<Vec<u8>>) -> Result<Self, AccessError> {
        let (frame_tx, frame_rx) = bounded::<Frame>(config.buffer_frames.max(1));
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();

        thread::Builder::new()
            .name("replay-reader".to_string())
            .spawn(move || run_reader(config, lines, thread_running, frame_tx))
            .map_err(|e| AccessError::Unavailable(format!("failed to spawn reader thread: {}", e)))?;

        Ok(Self {
            frames: frame_rx,
            running,
            exhausted: false,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for ReplayHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Frame source backed by a capture file
pub struct ReplayDevice {
    config: ReplayConfig,
}

impl ReplayDevice {
    pub fn new(config: ReplayConfig) -> Self {
        Self { config }
    }
}

impl Device for ReplayDevice {
    type Handle = ReplayHandle;

    fn request_access(&self, constraints: &Constraints) -> AccessFuture<ReplayHandle> {
        let config = self.config.clone();
        info!(
            "Requesting replay device {} (facing={}, ideal {}x{})",
            config.path.display(),
            constraints.facing,
            constraints.ideal_width,
            constraints.ideal_height
        );

        Box::pin(async move {
            let contents = tokio::fs::read(&config.path)
                .await
                .map_err(|e| access_error(&config.path, e))?;
            let lines = split_frames(&contents);
            info!(
                "Replay source opened: {} frames at {} fps{}",
                lines.len(),
                config.frames_per_second,
                if config.looping { " (looping)" } else { "" }
            );
            ReplayHandle::spawn(config, lines)
        })
    }

    fn poll_frame(&mut self, handle: &mut ReplayHandle) -> Result<Option<Frame>, DeviceError> {
        match handle.frames.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                if !handle.exhausted {
                    debug!("Replay source has no more frames");
                    handle.exhausted = true;
                }
                Err(DeviceError::Unavailable)
            }
        }
    }

    fn release(&mut self, handle: ReplayHandle) {
        info!("Releasing replay device {}", self.config.path.display());
        handle.running.store(false, Ordering::SeqCst);
    }
}

fn access_error(path: &Path, err: io::Error) -> AccessError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => AccessError::Denied,
        _ => AccessError::Unavailable(format!("{}: {}", path.display(), err)),
    }
}

/// Split a capture file into frames, one per non-empty line
fn split_frames(contents: &[u8]) -> Vec<Vec<u8>> {
    contents
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(<[u8]>::to_vec)
        .collect()
}

/// Reader loop (runs in dedicated thread)
fn run_reader(
    config: ReplayConfig,
    lines: Vec<Vec<u8>>,
    running: Arc<AtomicBool>,
    frame_tx: Sender<Frame>,
) {
    let interval = config.frame_interval();
    let mut sequence = 0u64;
    let mut dropped = 0u64;

    'replay: while running.load(Ordering::SeqCst) && !lines.is_empty() {
        for line in &lines {
            if !running.load(Ordering::SeqCst) {
                break 'replay;
            }

            sequence += 1;
            match frame_tx.try_send(Frame::new(sequence, line.clone())) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    debug!("Frame channel full, dropping frame {}", sequence);
                }
                Err(TrySendError::Disconnected(_)) => break 'replay,
            }

            thread::sleep(interval);
        }

        if !config.looping {
            break;
        }
    }

    if dropped > 0 {
        warn!("Replay reader dropped {} of {} frames", dropped, sequence);
    }
    debug!("Replay reader stopped after {} frames", sequence);
}
