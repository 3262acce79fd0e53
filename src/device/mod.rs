//! Device capability - access requests, frame polling and release
//!
//! The scanning engine never talks to hardware directly. A host supplies a
//! [`Device`] that can:
//! 1. Request access with a set of [`Constraints`] (asynchronous, single-shot)
//! 2. Poll the granted handle for the next ready [`Frame`] (non-blocking)
//! 3. Release the handle once the session is done with it

pub mod replay;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Instant;

use thiserror::Error;

pub use replay::{ReplayConfig, ReplayDevice, ReplayHandle};

/// Outstanding access request, resolved exactly once by the host
pub type AccessFuture<H> = Pin<Box<dyn Future<Output = Result<H, AccessError>> + Send + 'static>>;

/// Why a device could not be acquired
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("device access denied")]
    Denied,

    #[error("device unavailable: {0}")]
    Unavailable(String),
}

/// Failure while polling an acquired device
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("device disconnected")]
    Unavailable,
}

/// Which way the camera should face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    /// Rear camera, pointed at the item being scanned
    #[default]
    Environment,
    /// Front camera, pointed at the operator
    User,
}

impl Facing {
    pub fn as_str(self) -> &'static str {
        match self {
            Facing::Environment => "environment",
            Facing::User => "user",
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown camera facing '{0}' (expected 'environment' or 'user')")]
pub struct UnknownFacing(pub String);

impl FromStr for Facing {
    type Err = UnknownFacing;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "environment" | "rear" | "back" => Ok(Facing::Environment),
            "user" | "front" => Ok(Facing::User),
            _ => Err(UnknownFacing(s.to_string())),
        }
    }
}

/// Requested capture properties, passed through to the host verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraints {
    pub facing: Facing,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            facing: Facing::Environment,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// One captured image buffer; the pixel format is opaque to the engine
#[derive(Debug, Clone)]
pub struct Frame {
    pub sequence: u64,
    pub data: Vec<u8>,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(sequence: u64, data: Vec<u8>) -> Self {
        Self {
            sequence,
            data,
            captured_at: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A camera-like video source
///
/// `Handle` is an opaque, single-release token: [`Device::release`] takes it
/// by value, so a handle can never be released twice.
pub trait Device {
    type Handle: Send + 'static;

    /// Ask the host for access. The returned future must not borrow `self`.
    fn request_access(&self, constraints: &Constraints) -> AccessFuture<Self::Handle>;

    /// Return the next ready frame, or `None` if nothing is ready yet.
    fn poll_frame(&mut self, handle: &mut Self::Handle) -> Result<Option<Frame>, DeviceError>;

    /// Free the underlying device resources.
    fn release(&mut self, handle: Self::Handle);
}
