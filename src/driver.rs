//! Scan driver - runs a session on tokio
//!
//! The driver is the host side of a [`ScanSession`]: it awaits the access
//! request, turns timer expiries into ticks and forwards stop requests.
//! The session lives in its own task, so it only ever sees one input at a
//! time and outlives a dropped `run` future long enough to release a late
//! access grant.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use crate::decoder::{Decode, Payload};
use crate::device::{AccessError, Constraints, Device};
use crate::observer::ScanObserver;
use crate::session::{ScanSession, ScanState, ScanStats, SessionError, TickHandle, TickId, TickScheduler};

type AccessResult<H> = Result<H, AccessError>;

/// Why a stop was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Caller asked for it
    Requested,
    /// The caller-supplied scan timeout elapsed
    Deadline,
    /// The `run` future was dropped before the session settled
    Teardown,
}

/// Cancels a running scan. Cheap to clone; stopping twice is harmless.
#[derive(Debug, Clone)]
pub struct StopHandle {
    stop_tx: mpsc::UnboundedSender<StopReason>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stop_with(StopReason::Requested);
    }

    fn stop_with(&self, reason: StopReason) {
        if self.stop_tx.send(reason).is_err() {
            debug!("Stop ({:?}) after the scan already finished", reason);
        }
    }
}

/// Stops the session unless disarmed, so dropping `run` tears it down
struct TeardownGuard {
    stop: Option<StopHandle>,
}

impl TeardownGuard {
    fn disarm(mut self) {
        self.stop = None;
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            info!("Scan dropped before it settled, stopping session");
            stop.stop_with(StopReason::Teardown);
        }
    }
}

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub tick_interval: Duration,
    /// Stop the scan after this long. `None` scans until found or stopped.
    pub timeout: Option<Duration>,
    pub constraints: Constraints,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            timeout: None,
            constraints: Constraints::default(),
        }
    }
}

/// How a driven session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub state: ScanState,
    pub payload: Option<Payload>,
    pub denial: Option<AccessError>,
    pub stop_reason: Option<StopReason>,
}

/// Why `run` produced no outcome
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("scan task ended without an outcome")]
    TaskFailed,
}

/// Tick scheduler backed by tokio timers
///
/// Each tick is a sleeping task that posts its id when it wakes;
/// cancelling aborts the task.
struct TokioTicker {
    interval: Duration,
    next_id: u64,
    ticks_tx: mpsc::UnboundedSender<TickId>,
    pending: Option<(TickId, AbortHandle)>,
}

impl TokioTicker {
    fn new(interval: Duration, ticks_tx: mpsc::UnboundedSender<TickId>) -> Self {
        Self {
            interval,
            next_id: 0,
            ticks_tx,
            pending: None,
        }
    }
}

impl TickScheduler for TokioTicker {
    fn schedule_next(&mut self) -> TickHandle {
        self.next_id += 1;
        let id = TickId::new(self.next_id);
        let ticks_tx = self.ticks_tx.clone();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let _ = ticks_tx.send(id);
        });

        // The previous tick, if any, has already fired.
        self.pending = Some((id, task.abort_handle()));
        TickHandle::new(id)
    }

    fn cancel(&mut self, handle: TickHandle) {
        match self.pending.take() {
            Some((id, task)) if id == handle.id() => {
                debug!("Aborting timer for {}", id);
                task.abort();
            }
            other => self.pending = other,
        }
    }
}

impl Drop for TokioTicker {
    fn drop(&mut self) {
        if let Some((_, task)) = self.pending.take() {
            task.abort();
        }
    }
}

/// Runs one session to completion
pub struct ScanDriver<D, X, O>
where
    D: Device,
    X: Decode,
    O: ScanObserver,
{
    session: ScanSession<D, X, TokioTicker, O>,
    ticks_rx: mpsc::UnboundedReceiver<TickId>,
    stop_tx: mpsc::UnboundedSender<StopReason>,
    stop_rx: mpsc::UnboundedReceiver<StopReason>,
    timeout: Option<Duration>,
}

impl<D, X, O> ScanDriver<D, X, O>
where
    D: Device + Send + 'static,
    X: Decode + Send + 'static,
    O: ScanObserver + Send + 'static,
{
    pub fn new(config: DriverConfig, device: D, decoder: X, observer: O) -> Self {
        let (ticks_tx, ticks_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        let ticker = TokioTicker::new(config.tick_interval, ticks_tx);
        let session = ScanSession::new(device, decoder, ticker, observer, config.constraints);

        Self {
            session,
            ticks_rx,
            stop_tx,
            stop_rx,
            timeout: config.timeout,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop_tx: self.stop_tx.clone(),
        }
    }

    pub fn stats(&self) -> &Arc<ScanStats> {
        self.session.stats()
    }

    pub fn state(&self) -> ScanState {
        self.session.state()
    }

    /// Start the session and drive it until it settles
    ///
    /// Returns as soon as the session reaches a terminal state. If it was
    /// stopped while the access request was outstanding, the session task
    /// keeps running in the background until the request resolves and
    /// releases a late grant. Dropping this future stops the session the
    /// same way [`StopHandle::stop`] does.
    pub async fn run(self) -> Result<ScanOutcome, DriverError> {
        let Self {
            mut session,
            ticks_rx,
            stop_tx,
            stop_rx,
            timeout,
        } = self;

        let request = session.start()?;

        let (access_tx, access_rx) = oneshot::channel();
        tokio::spawn(async move {
            let outcome = request.await;
            if let Err(Ok(_)) = access_tx.send(outcome) {
                warn!("Scan task gone before access was granted; handle dropped");
            }
        });

        let deadline = timeout.map(|timeout| {
            let stop = StopHandle {
                stop_tx: stop_tx.clone(),
            };
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                info!("Scan timeout of {:?} elapsed", timeout);
                stop.stop_with(StopReason::Deadline);
            })
        });

        let guard = TeardownGuard {
            stop: Some(StopHandle { stop_tx }),
        };

        let (outcome_tx, outcome_rx) = oneshot::channel();
        tokio::spawn(drive(session, access_rx, ticks_rx, stop_rx, deadline, outcome_tx));

        let outcome = outcome_rx.await.map_err(|_| DriverError::TaskFailed)?;
        guard.disarm();
        Ok(outcome)
    }
}

/// Session task: feeds inputs until the session settles, reports the
/// outcome, then waits out an access request that a stop raced
async fn drive<D, X, O>(
    mut session: ScanSession<D, X, TokioTicker, O>,
    mut access_rx: oneshot::Receiver<AccessResult<D::Handle>>,
    mut ticks_rx: mpsc::UnboundedReceiver<TickId>,
    mut stop_rx: mpsc::UnboundedReceiver<StopReason>,
    deadline: Option<JoinHandle<()>>,
    outcome_tx: oneshot::Sender<ScanOutcome>,
) where
    D: Device,
    X: Decode,
    O: ScanObserver,
{
    let mut stop_reason = None;
    while !session.state().is_terminal() {
        tokio::select! {
            biased;

            Some(reason) = stop_rx.recv() => {
                info!("Stop requested ({:?})", reason);
                stop_reason = Some(reason);
                session.stop();
            }
            access = &mut access_rx, if session.awaiting_access() => {
                session.access_resolved(access.unwrap_or_else(|_| abandoned()));
            }
            Some(id) = ticks_rx.recv() => session.tick(id),
        }
    }

    if let Some(deadline) = deadline {
        deadline.abort();
    }

    let outcome = ScanOutcome {
        state: session.state(),
        payload: session.result().cloned(),
        denial: session.denial().cloned(),
        stop_reason,
    };
    info!("Scan finished: {} | {}", outcome.state, session.stats());
    if outcome_tx.send(outcome).is_err() {
        debug!("Scan outcome has no receiver");
    }

    if session.awaiting_access() {
        debug!("Waiting for the outstanding access request");
        let access = access_rx.await.unwrap_or_else(|_| abandoned());
        session.access_resolved(access);
    }
}

fn abandoned<H>() -> AccessResult<H> {
    Err(AccessError::Unavailable("access request abandoned".to_string()))
}
