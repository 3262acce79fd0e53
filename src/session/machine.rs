//! Scan session - state machine and capture loop driver
//!
//! The session owns the device, the decoder, the tick scheduler and the
//! observer for its whole lifetime. It never blocks and never awaits: the
//! host feeds it three kinds of input and it reacts synchronously.
//! 1. `access_resolved` when the access request settles
//! 2. `tick` when a scheduled capture attempt fires
//! 3. `stop` (or dropping the session) to cancel
//!
//! Every way out of a live state goes through `settle`, which cancels the
//! pending tick and releases the device before the terminal state is visible.

use std::mem;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::state::{Phase, ScanState};
use super::stats::ScanStats;
use super::tick::{TickId, TickScheduler};
use super::SessionError;
use crate::decoder::{Decode, Payload};
use crate::device::{AccessError, AccessFuture, Constraints, Device};
use crate::observer::ScanObserver;

#[derive(Debug, Clone, Copy)]
enum StopCause {
    Requested,
    Teardown,
}

/// One run of the scanning engine, from `start` to a terminal state
pub struct ScanSession<D, X, S, O>
where
    D: Device,
    X: Decode,
    S: TickScheduler,
    O: ScanObserver,
{
    device: D,
    decoder: X,
    scheduler: S,
    observer: O,
    constraints: Constraints,
    phase: Phase<D::Handle>,
    awaiting_access: bool,
    stats: Arc<ScanStats>,
}

impl<D, X, S, O> ScanSession<D, X, S, O>
where
    D: Device,
    X: Decode,
    S: TickScheduler,
    O: ScanObserver,
{
    pub fn new(device: D, decoder: X, scheduler: S, observer: O, constraints: Constraints) -> Self {
        Self {
            device,
            decoder,
            scheduler,
            observer,
            constraints,
            phase: Phase::Idle,
            awaiting_access: false,
            stats: Arc::new(ScanStats::new()),
        }
    }

    pub fn state(&self) -> ScanState {
        self.phase.state()
    }

    /// The decoded payload, once the session is `Found`
    pub fn result(&self) -> Option<&Payload> {
        match &self.phase {
            Phase::Found(payload) => Some(payload),
            _ => None,
        }
    }

    /// Why access was refused, once the session is `PermissionDenied`
    pub fn denial(&self) -> Option<&AccessError> {
        match &self.phase {
            Phase::PermissionDenied(err) => Some(err),
            _ => None,
        }
    }

    /// True while an access request is outstanding, including after a stop
    /// that raced it.
    pub fn awaiting_access(&self) -> bool {
        self.awaiting_access
    }

    pub fn stats(&self) -> &Arc<ScanStats> {
        &self.stats
    }

    /// Begin the session and issue the device access request
    ///
    /// The caller drives the returned future and hands its output to
    /// [`access_resolved`](Self::access_resolved). A refusal is not an error
    /// here: it surfaces later as `PermissionDenied`.
    pub fn start(&mut self) -> Result<AccessFuture<D::Handle>, SessionError> {
        if !matches!(self.phase, Phase::Idle) {
            warn!("start() on a session that is already {}", self.state());
            return Err(SessionError::AlreadyStarted(self.state()));
        }

        info!(
            "Starting scan session (facing={}, ideal {}x{})",
            self.constraints.facing, self.constraints.ideal_width, self.constraints.ideal_height
        );
        let request = self.device.request_access(&self.constraints);
        self.awaiting_access = true;
        self.enter(Phase::RequestingAccess);
        Ok(request)
    }

    /// Feed the outcome of the access request
    pub fn access_resolved(&mut self, outcome: Result<D::Handle, AccessError>) {
        let awaited = mem::replace(&mut self.awaiting_access, false);
        let requesting = matches!(self.phase, Phase::RequestingAccess);

        match outcome {
            Ok(device) if requesting => {
                info!("Device access granted, scanning");
                let tick = self.scheduler.schedule_next();
                self.enter(Phase::Scanning {
                    device,
                    tick: Some(tick),
                });
            }
            Err(err) if requesting => {
                warn!("Device access refused: {}", err);
                self.settle(Phase::PermissionDenied(err));
            }
            Ok(device) => {
                if awaited {
                    info!("Access granted after session {}, releasing device", self.state());
                } else {
                    warn!("Unexpected access grant while {}, releasing device", self.state());
                }
                self.device.release(device);
                self.stats.record_release();
            }
            Err(err) => {
                debug!("Ignoring access result ({}) while {}", err, self.state());
            }
        }
    }

    /// Run one capture attempt: poll, decode, then reschedule or finish
    ///
    /// Ticks that do not match the pending tick are ignored.
    pub fn tick(&mut self, id: TickId) {
        if self.pending_tick() != Some(id) {
            self.stats.record_stale_tick();
            debug!("Ignoring stale {} while {}", id, self.state());
            return;
        }

        let polled = match &mut self.phase {
            Phase::Scanning { device, tick } => {
                // Fired, so the handle is spent.
                *tick = None;
                self.stats.record_poll();
                self.device.poll_frame(device)
            }
            _ => return,
        };

        let frame = match polled {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.reschedule();
                return;
            }
            Err(err) => {
                self.stats.record_device_error();
                debug!("Poll failed on {} ({}), treating as no frame", id, err);
                self.reschedule();
                return;
            }
        };

        self.stats.record_frame();
        self.stats.record_decode();
        match self.decoder.decode(&frame) {
            Some(payload) => {
                info!("Decoded payload from frame {} on {}", frame.sequence, id);
                self.settle(Phase::Found(payload));
            }
            None => {
                self.stats.record_miss();
                self.reschedule();
            }
        }
    }

    /// Cancel the session. Idempotent, callable from any state.
    pub fn stop(&mut self) {
        self.halt(StopCause::Requested);
    }

    fn halt(&mut self, cause: StopCause) {
        if self.phase.is_terminal() {
            debug!("Session already {}, {:?} stop is a no-op", self.state(), cause);
            return;
        }

        info!("Stopping scan session while {} ({:?})", self.state(), cause);
        if self.awaiting_access {
            debug!("Access request still outstanding; a late grant will be released");
        }
        self.settle(Phase::Stopped);
    }

    fn pending_tick(&self) -> Option<TickId> {
        match &self.phase {
            Phase::Scanning { tick: Some(tick), .. } => Some(tick.id()),
            _ => None,
        }
    }

    fn reschedule(&mut self) {
        if let Phase::Scanning { tick, .. } = &mut self.phase {
            *tick = Some(self.scheduler.schedule_next());
        }
    }

    /// Non-terminal transition
    fn enter(&mut self, next: Phase<D::Handle>) {
        self.phase = next;
        let state = self.state();
        debug!("Scan session -> {}", state);
        self.observer.on_state_change(state);
    }

    /// The single exit path: cancel, release, then publish the terminal state
    fn settle(&mut self, terminal: Phase<D::Handle>) {
        if self.phase.is_terminal() || !terminal.is_terminal() {
            return;
        }

        let previous = mem::replace(&mut self.phase, terminal);
        if let Phase::Scanning { device, tick } = previous {
            if let Some(tick) = tick {
                debug!("Cancelling pending {}", tick.id());
                self.scheduler.cancel(tick);
            }
            self.device.release(device);
            self.stats.record_release();
        }

        let state = self.state();
        info!("Scan session finished: {}", state);
        if let Phase::Found(payload) = &self.phase {
            self.observer.on_result(payload);
        }
        self.observer.on_state_change(state);
    }
}

impl<D, X, S, O> Drop for ScanSession<D, X, S, O>
where
    D: Device,
    X: Decode,
    S: TickScheduler,
    O: ScanObserver,
{
    fn drop(&mut self) {
        self.halt(StopCause::Teardown);
    }
}
