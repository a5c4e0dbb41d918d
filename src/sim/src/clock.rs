use sched::Tick;
use std::sync::atomic::{AtomicU64, Ordering};

/// The simulated clock: a bare tick counter, advanced by the machine's timer
/// thread at a fixed real-time rate.
#[derive(Debug, Default)]
pub struct Clock {
    ticks: AtomicU64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Tick {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn advance(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }
}
