//! Per-session counters

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for a single scan session
#[derive(Debug, Default)]
pub struct ScanStats {
    pub polls: AtomicU64,
    pub frames: AtomicU64,
    pub decode_attempts: AtomicU64,
    pub decode_misses: AtomicU64,
    pub device_errors: AtomicU64,
    pub stale_ticks: AtomicU64,
    pub releases: AtomicU64,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode(&self) {
        self.decode_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.decode_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_device_error(&self) {
        self.device_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_tick(&self) {
        self.stale_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    pub fn get_frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn get_decode_attempts(&self) -> u64 {
        self.decode_attempts.load(Ordering::Relaxed)
    }

    pub fn get_decode_misses(&self) -> u64 {
        self.decode_misses.load(Ordering::Relaxed)
    }

    pub fn get_device_errors(&self) -> u64 {
        self.device_errors.load(Ordering::Relaxed)
    }

    pub fn get_stale_ticks(&self) -> u64 {
        self.stale_ticks.load(Ordering::Relaxed)
    }

    pub fn get_releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }
}

impl fmt::Display for ScanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Polls: {} | Frames: {} | Decodes: {} (misses: {}) | Device errors: {} | Stale ticks: {} | Releases: {}",
            self.get_polls(),
            self.get_frames(),
            self.get_decode_attempts(),
            self.get_decode_misses(),
            self.get_device_errors(),
            self.get_stale_ticks(),
            self.get_releases(),
        )
    }
}
