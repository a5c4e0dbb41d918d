use crate::Tick;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Unique identifier of a simulated process.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pid(u32);

impl Pid {
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    New,
    Ready,
    Running,
    Waiting,
    Terminated,
}

/// A process control block.
///
/// Records are created by the simulator in [`ProcState::New`] and enter the
/// scheduler through [`Scheduler::wake_up`](crate::Scheduler::wake_up); every
/// later transition is driven by an event handler. The scheduler never owns a
/// record outright: the simulator keeps waiting processes during I/O and
/// receives terminated ones back, so everything that changes over a process's
/// life is atomic and the record is shared behind an [`Arc`].
#[derive(Debug)]
pub struct Proc {
    pid: Pid,
    name: String,
    priority: u32,
    arrival_time: Tick,
    state: AtomicU8,
    enqueue_time: AtomicU64,
    total_remaining: AtomicU64,
    burst_remaining: AtomicU64,
}

impl Proc {
    /// `total_time` is the process's whole CPU and I/O demand, in ticks.
    pub fn new(
        pid: Pid,
        name: impl Into<String>,
        priority: u32,
        arrival_time: Tick,
        total_time: Tick,
    ) -> Arc<Self> {
        Arc::new(Self {
            pid,
            name: name.into(),
            priority,
            arrival_time,
            state: AtomicU8::new(ProcState::New as u8),
            enqueue_time: AtomicU64::new(0),
            total_remaining: AtomicU64::new(total_time),
            burst_remaining: AtomicU64::new(0),
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Smaller is more urgent.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Tick at which the process first enters the ready queue.
    pub fn arrival_time(&self) -> Tick {
        self.arrival_time
    }

    pub fn state(&self) -> ProcState {
        match self.state.load(Ordering::Relaxed) {
            0 => ProcState::New,
            1 => ProcState::Ready,
            2 => ProcState::Running,
            3 => ProcState::Waiting,
            4 => ProcState::Terminated,
            v => unreachable!("invalid process state {v}"),
        }
    }

    pub(crate) fn set_state(&self, state: ProcState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    /// Tick of the most recent enqueue. Feeds priority aging.
    pub fn enqueue_time(&self) -> Tick {
        self.enqueue_time.load(Ordering::Relaxed)
    }

    pub(crate) fn set_enqueue_time(&self, now: Tick) {
        self.enqueue_time.store(now, Ordering::Relaxed);
    }

    /// Remaining CPU plus I/O demand, in ticks.
    pub fn total_remaining(&self) -> Tick {
        self.total_remaining.load(Ordering::Relaxed)
    }

    /// Ticks left in the current CPU burst. Owned by the simulator; the
    /// scheduler never reads it.
    pub fn burst_remaining(&self) -> Tick {
        self.burst_remaining.load(Ordering::Relaxed)
    }

    pub fn set_burst_remaining(&self, ticks: Tick) {
        self.burst_remaining.store(ticks, Ordering::Relaxed);
    }

    /// Accounts one tick of simulated CPU execution.
    pub fn consume_burst_tick(&self) {
        decrement(&self.burst_remaining);
        decrement(&self.total_remaining);
    }

    /// Accounts one tick of simulated I/O.
    pub fn consume_io_tick(&self) {
        decrement(&self.total_remaining);
    }
}

fn decrement(v: &AtomicU64) {
    let old = v.fetch_sub(1, Ordering::Relaxed);
    debug_assert!(old > 0, "tick accounting underflow");
}
