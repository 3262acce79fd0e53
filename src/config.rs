//! Configuration loaded from environment variables

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::decoder::DEFAULT_MAX_PAYLOAD;
use crate::device::{Constraints, Facing, ReplayConfig};
use crate::driver::DriverConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Capture file replayed as the video device
    pub source: PathBuf,

    /// Delay between capture attempts in milliseconds
    pub tick_ms: u64,

    /// Replay frame rate
    pub fps: u32,

    /// Replay the capture file from the start when it ends
    pub looping: bool,

    /// Requested camera facing
    pub facing: Facing,

    /// Ideal capture resolution
    pub width: u32,
    pub height: u32,

    /// Give up after this many milliseconds (unset scans until found or interrupted)
    pub timeout_ms: Option<u64>,

    /// Largest payload the decoder accepts, in bytes
    pub max_payload: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source
    ///
    /// Unparseable numbers fall back to their defaults; an unknown facing is
    /// rejected.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let facing = match lookup("SCAN_FACING") {
            Some(value) => value.parse::<Facing>().context("Invalid SCAN_FACING")?,
            None => Facing::Environment,
        };

        Ok(Self {
            source: lookup("SCAN_SOURCE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("frames.txt")),

            tick_ms: parse_var(&lookup, "SCAN_TICK_MS").unwrap_or(50),

            fps: parse_var(&lookup, "SCAN_FPS").filter(|&fps: &u32| fps > 0).unwrap_or(30),

            looping: lookup("SCAN_LOOP")
                .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),

            facing,

            width: parse_var(&lookup, "SCAN_WIDTH").unwrap_or(1280),

            height: parse_var(&lookup, "SCAN_HEIGHT").unwrap_or(720),

            timeout_ms: parse_var(&lookup, "SCAN_TIMEOUT_MS").filter(|&ms: &u64| ms > 0),

            max_payload: parse_var(&lookup, "SCAN_MAX_PAYLOAD").unwrap_or(DEFAULT_MAX_PAYLOAD),
        })
    }

    pub fn constraints(&self) -> Constraints {
        Constraints {
            facing: self.facing,
            ideal_width: self.width,
            ideal_height: self.height,
        }
    }

    pub fn replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            path: self.source.clone(),
            frames_per_second: self.fps,
            looping: self.looping,
            ..ReplayConfig::default()
        }
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            tick_interval: Duration::from_millis(self.tick_ms),
            timeout: self.timeout_ms.map(Duration::from_millis),
            constraints: self.constraints(),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}
