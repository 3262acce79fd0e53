//! Scan session - the lifecycle core
//!
//! States: Idle → RequestingAccess → Scanning → {Found | PermissionDenied | Stopped}.
//! Terminal states are absorbing and hold no device handle and no pending tick.

mod machine;
mod state;
mod stats;
mod tick;

use thiserror::Error;

pub use machine::ScanSession;
pub use state::ScanState;
pub use stats::ScanStats;
pub use tick::{TickHandle, TickId, TickScheduler};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session already started (currently {0})")]
    AlreadyStarted(ScanState),
}
