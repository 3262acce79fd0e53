//! Instrumented fakes shared by the session and driver tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use tokio::sync::oneshot;

use crate::decoder::{Decode, Payload};
use crate::device::{AccessError, AccessFuture, Constraints, Device, DeviceError, Frame};
use crate::observer::ScanObserver;
use crate::session::{ScanSession, ScanState, TickHandle, TickId, TickScheduler};

pub(crate) const PAYLOAD: &str = "QR-CODE-42";

pub(crate) type TestSession = ScanSession<FakeDevice, ScriptedDecoder, ManualScheduler, RecordingObserver>;

/// Opaque fake device handle; deliberately not `Clone`
#[derive(Debug)]
pub(crate) struct FakeHandle(u32);

#[derive(Debug, Clone, Default)]
pub(crate) struct DeviceLog {
    pub requests: usize,
    pub acquired: usize,
    pub polls: usize,
    pub released: Vec<u32>,
}

/// What the next poll returns; polls past the script yield a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Poll {
    Empty,
    Disconnected,
    Frame,
}

pub(crate) enum AccessPlan {
    Grant,
    Deny,
    /// Resolves when the sender fires: `true` grants, anything else denies
    Gated(oneshot::Receiver<bool>),
}

fn issue(log: &Arc<Mutex<DeviceLog>>) -> FakeHandle {
    let mut log = log.lock().unwrap();
    log.acquired += 1;
    FakeHandle(log.acquired as u32)
}

pub(crate) struct FakeDevice {
    log: Arc<Mutex<DeviceLog>>,
    polls: Arc<Mutex<VecDeque<Poll>>>,
    deny: bool,
    gate: Mutex<Option<oneshot::Receiver<bool>>>,
}

impl Device for FakeDevice {
    type Handle = FakeHandle;

    fn request_access(&self, _constraints: &Constraints) -> AccessFuture<FakeHandle> {
        self.log.lock().unwrap().requests += 1;
        let log = self.log.clone();

        if let Some(gate) = self.gate.lock().unwrap().take() {
            return Box::pin(async move {
                match gate.await {
                    Ok(true) => Ok(issue(&log)),
                    _ => Err(AccessError::Denied),
                }
            });
        }

        let deny = self.deny;
        Box::pin(async move {
            if deny {
                Err(AccessError::Denied)
            } else {
                Ok(issue(&log))
            }
        })
    }

    fn poll_frame(&mut self, handle: &mut FakeHandle) -> Result<Option<Frame>, DeviceError> {
        let polls = {
            let mut log = self.log.lock().unwrap();
            assert!(!log.released.contains(&handle.0), "poll on released handle");
            log.polls += 1;
            log.polls
        };

        match self.polls.lock().unwrap().pop_front().unwrap_or(Poll::Frame) {
            Poll::Empty => Ok(None),
            Poll::Disconnected => Err(DeviceError::Unavailable),
            Poll::Frame => Ok(Some(Frame::new(polls as u64, b"frame".to_vec()))),
        }
    }

    fn release(&mut self, handle: FakeHandle) {
        self.log.lock().unwrap().released.push(handle.0);
    }
}

/// Misses until the `hit_on`-th decode call
pub(crate) struct ScriptedDecoder {
    hit_on: Option<usize>,
    calls: Arc<AtomicUsize>,
}

impl Decode for ScriptedDecoder {
    fn decode(&self, _frame: &Frame) -> Option<Payload> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (Some(call) == self.hit_on).then(|| Payload::from(PAYLOAD))
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TickLog {
    pub scheduled: Vec<TickId>,
    pub cancelled: Vec<TickId>,
    pub fired: Vec<TickId>,
}

/// Scheduler whose ticks only fire when a test says so
pub(crate) struct ManualScheduler {
    next: u64,
    log: Arc<Mutex<TickLog>>,
}

impl TickScheduler for ManualScheduler {
    fn schedule_next(&mut self) -> TickHandle {
        self.next += 1;
        let id = TickId::new(self.next);
        self.log.lock().unwrap().scheduled.push(id);
        TickHandle::new(id)
    }

    fn cancel(&mut self, handle: TickHandle) {
        self.log.lock().unwrap().cancelled.push(handle.id());
    }
}

#[derive(Debug, Default)]
pub(crate) struct Observed {
    pub results: Vec<Payload>,
    pub states: Vec<ScanState>,
}

pub(crate) struct RecordingObserver {
    observed: Arc<Mutex<Observed>>,
}

impl ScanObserver for RecordingObserver {
    fn on_result(&mut self, payload: &Payload) {
        self.observed.lock().unwrap().results.push(payload.clone());
    }

    fn on_state_change(&mut self, state: ScanState) {
        self.observed.lock().unwrap().states.push(state);
    }
}

/// Read side of the fakes, kept by the test
pub(crate) struct Rig {
    device_log: Arc<Mutex<DeviceLog>>,
    polls: Arc<Mutex<VecDeque<Poll>>>,
    tick_log: Arc<Mutex<TickLog>>,
    decodes: Arc<AtomicUsize>,
    observed: Arc<Mutex<Observed>>,
}

impl Rig {
    pub fn issue_handle(&self) -> FakeHandle {
        issue(&self.device_log)
    }

    pub fn script_polls(&self, polls: impl IntoIterator<Item = Poll>) {
        self.polls.lock().unwrap().extend(polls);
    }

    /// The tick the session is waiting on, if any
    pub fn pending_tick(&self) -> Option<TickId> {
        let log = self.tick_log.lock().unwrap();
        let last = *log.scheduled.last()?;
        (!log.cancelled.contains(&last) && !log.fired.contains(&last)).then_some(last)
    }

    /// Fire the pending tick, if there is one
    pub fn fire(&self, session: &mut TestSession) {
        if let Some(id) = self.pending_tick() {
            self.tick_log.lock().unwrap().fired.push(id);
            session.tick(id);
        }
    }

    pub fn apply(&self, session: &mut TestSession, op: Op) {
        match op {
            Op::Start => {
                let _ = session.start();
            }
            Op::Grant => session.access_resolved(Ok(self.issue_handle())),
            Op::Deny => session.access_resolved(Err(AccessError::Denied)),
            Op::Tick => self.fire(session),
            Op::StaleTick => session.tick(TickId::new(u64::MAX)),
            Op::Stop => session.stop(),
        }
    }

    pub fn device(&self) -> DeviceLog {
        self.device_log.lock().unwrap().clone()
    }

    pub fn ticks(&self) -> TickLog {
        self.tick_log.lock().unwrap().clone()
    }

    pub fn decode_calls(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn results(&self) -> Vec<Payload> {
        self.observed.lock().unwrap().results.clone()
    }

    pub fn states(&self) -> Vec<ScanState> {
        self.observed.lock().unwrap().states.clone()
    }
}

/// Build the fakes without a scheduler, for hosts that bring their own
pub(crate) fn fakes(
    hit_on: Option<usize>,
    plan: AccessPlan,
) -> (FakeDevice, ScriptedDecoder, RecordingObserver, Rig) {
    let device_log = Arc::new(Mutex::new(DeviceLog::default()));
    let polls = Arc::new(Mutex::new(VecDeque::new()));
    let decodes = Arc::new(AtomicUsize::new(0));
    let observed = Arc::new(Mutex::new(Observed::default()));

    let (deny, gate) = match plan {
        AccessPlan::Grant => (false, None),
        AccessPlan::Deny => (true, None),
        AccessPlan::Gated(rx) => (false, Some(rx)),
    };

    let device = FakeDevice {
        log: device_log.clone(),
        polls: polls.clone(),
        deny,
        gate: Mutex::new(gate),
    };
    let decoder = ScriptedDecoder {
        hit_on,
        calls: decodes.clone(),
    };
    let observer = RecordingObserver {
        observed: observed.clone(),
    };
    let rig = Rig {
        device_log,
        polls,
        tick_log: Arc::new(Mutex::new(TickLog::default())),
        decodes,
        observed,
    };

    (device, decoder, observer, rig)
}

/// A session wired to fakes and a manually fired scheduler
pub(crate) fn rig(hit_on: Option<usize>, plan: AccessPlan) -> (TestSession, Rig) {
    let (device, decoder, observer, rig) = fakes(hit_on, plan);
    let scheduler = ManualScheduler {
        next: 0,
        log: rig.tick_log.clone(),
    };
    let session = ScanSession::new(device, decoder, scheduler, observer, Constraints::default());
    (session, rig)
}

/// One host-side input to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Start,
    Grant,
    Deny,
    Tick,
    StaleTick,
    Stop,
}

pub(crate) fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => Just(Op::Start),
        1 => Just(Op::Grant),
        1 => Just(Op::Deny),
        3 => Just(Op::Tick),
        1 => Just(Op::StaleTick),
        1 => Just(Op::Stop),
    ]
}
