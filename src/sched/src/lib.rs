pub use self::config::{Config, ConfigError, Policy, MAX_CPUS};
pub use self::proc::{Pid, Proc, ProcState};
pub use self::scheduler::Scheduler;

use std::sync::Arc;

mod config;
mod proc;
mod queue;
mod scheduler;

/// The simulator's discrete unit of time.
pub type Tick = u64;

/// Index of a simulated CPU, always below the configured CPU count.
pub type CpuId = usize;

/// The simulator side of the scheduling protocol.
///
/// The scheduler holds one of these and calls it back whenever it has made a
/// decision. The other direction of the protocol is the event surface on
/// [`Scheduler`]: the simulator invokes `idle`, `preempt`, `yield_cpu` and
/// `terminate` from its per-CPU threads and `wake_up` from its I/O thread.
pub trait Simulator: Send + Sync {
    /// Current simulated time. Monotonically non-decreasing and thread-safe.
    fn current_time(&self) -> Tick;

    /// Tells the simulator which process to simulate next on `cpu`, or that the
    /// CPU is now idle. Non-blocking, and never invoked with a scheduler lock
    /// held. `slice` is the preemption quantum; [`None`] runs the process
    /// without a timer.
    fn context_switch(&self, cpu: CpuId, proc: Option<Arc<Proc>>, slice: Option<Tick>);

    /// Asks the simulator to arrange a [`Scheduler::preempt`] call for `cpu`,
    /// on that CPU's own thread. May complete asynchronously.
    fn force_preempt(&self, cpu: CpuId);
}
