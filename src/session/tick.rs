//! Tick scheduling primitives

use std::fmt;

/// Identifies one scheduled capture attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickId(u64);

impl TickId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick#{}", self.0)
    }
}

/// A pending tick
///
/// Not `Clone`: a handle is spent either by firing or by being passed to
/// [`TickScheduler::cancel`], never both.
#[derive(Debug, PartialEq, Eq)]
pub struct TickHandle {
    id: TickId,
}

impl TickHandle {
    pub fn new(id: TickId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> TickId {
        self.id
    }
}

/// Cooperative, single-dispatch timer
///
/// When a scheduled tick fires, the host calls
/// [`ScanSession::tick`](super::ScanSession::tick) with its id.
pub trait TickScheduler {
    fn schedule_next(&mut self) -> TickHandle;
    fn cancel(&mut self, handle: TickHandle);
}
