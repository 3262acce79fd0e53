//! Session states

use std::fmt;

use super::tick::TickHandle;
use crate::decoder::Payload;
use crate::device::AccessError;

/// Externally visible session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanState {
    Idle,
    RequestingAccess,
    Scanning,
    Found,
    PermissionDenied,
    Stopped,
}

impl ScanState {
    /// Terminal states are absorbing and hold no resources
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScanState::Found | ScanState::PermissionDenied | ScanState::Stopped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::RequestingAccess => "requesting-access",
            ScanState::Scanning => "scanning",
            ScanState::Found => "found",
            ScanState::PermissionDenied => "permission-denied",
            ScanState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session state together with the resources it owns
///
/// Only `Scanning` can hold a device handle or a pending tick.
pub(crate) enum Phase<H> {
    Idle,
    RequestingAccess,
    Scanning {
        device: H,
        /// `None` only while the tick that just fired is being processed
        tick: Option<TickHandle>,
    },
    Found(Payload),
    PermissionDenied(AccessError),
    Stopped,
}

impl<H> Phase<H> {
    pub(crate) fn state(&self) -> ScanState {
        match self {
            Phase::Idle => ScanState::Idle,
            Phase::RequestingAccess => ScanState::RequestingAccess,
            Phase::Scanning { .. } => ScanState::Scanning,
            Phase::Found(_) => ScanState::Found,
            Phase::PermissionDenied(_) => ScanState::PermissionDenied,
            Phase::Stopped => ScanState::Stopped,
        }
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }
}
