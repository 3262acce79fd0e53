//! Live code scanning engine
//!
//! Acquires a camera-like device, polls it for frames on a cooperative tick,
//! hands each frame to a decoder and stops on the first payload, on request,
//! on permission denial or on teardown. Whatever the exit, the device handle
//! and the pending tick are released exactly once.

pub mod config;
pub mod decoder;
pub mod device;
pub mod driver;
pub mod observer;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use decoder::{Decode, MarkerDecoder, Payload};
pub use device::{AccessError, Constraints, Device, DeviceError, Facing, Frame, ReplayDevice};
pub use driver::{DriverConfig, DriverError, ScanDriver, ScanOutcome, StopHandle, StopReason};
pub use observer::{ChannelObserver, ScanObserver, ScanUpdate};
pub use session::{ScanSession, ScanState, ScanStats, SessionError, TickHandle, TickId, TickScheduler};
