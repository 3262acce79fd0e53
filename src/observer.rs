//! Result sink - how a session reports back to its caller

use tokio::sync::mpsc;
use tracing::debug;

use crate::decoder::Payload;
use crate::session::ScanState;

/// Caller-supplied sink for session results
pub trait ScanObserver {
    /// Called exactly once, and only when the session reaches `Found`.
    fn on_result(&mut self, payload: &Payload);

    /// Called on every state transition. Purely informational.
    fn on_state_change(&mut self, _state: ScanState) {}
}

impl ScanObserver for () {
    fn on_result(&mut self, _payload: &Payload) {}
}

/// Update forwarded by [`ChannelObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanUpdate {
    State { state: ScanState, timestamp_ms: u64 },
    Result { payload: Payload, timestamp_ms: u64 },
}

/// Forwards session updates over a channel, e.g. to a UI task
pub struct ChannelObserver {
    updates_tx: mpsc::UnboundedSender<ScanUpdate>,
}

impl ChannelObserver {
    pub fn new(updates_tx: mpsc::UnboundedSender<ScanUpdate>) -> Self {
        Self { updates_tx }
    }

    fn send(&self, update: ScanUpdate) {
        if let Err(e) = self.updates_tx.send(update) {
            debug!("Scan update dropped, receiver gone: {:?}", e.0);
        }
    }
}

impl ScanObserver for ChannelObserver {
    fn on_result(&mut self, payload: &Payload) {
        self.send(ScanUpdate::Result {
            payload: payload.clone(),
            timestamp_ms: now_ms(),
        });
    }

    fn on_state_change(&mut self, state: ScanState) {
        self.send(ScanUpdate::State {
            state,
            timestamp_ms: now_ms(),
        });
    }
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}
