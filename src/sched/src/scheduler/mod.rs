use self::select::priority_with_age;
use crate::config::{Config, Policy};
use crate::proc::{Proc, ProcState};
use crate::queue::ReadyQueue;
use crate::{CpuId, Simulator};
use std::sync::{Arc, Condvar, Mutex};

mod select;

/// The scheduling core.
///
/// One value per simulation, shared by every CPU thread and the I/O thread.
/// Two structures are guarded separately: the ready queue, paired with a
/// "queue not empty" condition, and the running table mapping each CPU to its
/// current process. The two locks are never held at the same time.
pub struct Scheduler {
    sim: Arc<dyn Simulator>,
    policy: Policy,
    cpus: usize,
    ready: Mutex<ReadyQueue>,
    queue_not_empty: Condvar,
    current: Mutex<Vec<Option<Arc<Proc>>>>,
}

impl Scheduler {
    pub fn new(config: Config, sim: Arc<dyn Simulator>) -> Self {
        Self {
            sim,
            policy: config.policy,
            cpus: config.cpus,
            ready: Mutex::new(ReadyQueue::new()),
            queue_not_empty: Condvar::new(),
            current: Mutex::new(vec![None; config.cpus]),
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn cpus(&self) -> usize {
        self.cpus
    }

    /// Called by a CPU thread that has nothing to run. Blocks until the ready
    /// queue is non-empty, then schedules onto `cpu`.
    ///
    /// This is the only operation that suspends its caller.
    pub fn idle(&self, cpu: CpuId) {
        {
            let mut ready = self.ready.lock().unwrap();

            while ready.is_empty() {
                ready = self.queue_not_empty.wait(ready).unwrap();
            }
        }

        self.schedule(cpu);
    }

    /// Called when the round-robin timer fires on `cpu`, or when a forced
    /// preemption lands there. Puts the running process, if any, back on the
    /// ready queue and reschedules. With nothing better queued the preempted
    /// process is reselected immediately.
    pub fn preempt(&self, cpu: CpuId) {
        let proc = self.current.lock().unwrap()[cpu].clone();

        if let Some(proc) = proc {
            proc.set_state(ProcState::Ready);
            self.enqueue(proc);
        }

        self.schedule(cpu);
    }

    /// Called when the process on `cpu` starts an I/O request. The process
    /// leaves the running table here; the simulator keeps it for the duration
    /// of the I/O and hands it back through [`wake_up`](Self::wake_up).
    pub fn yield_cpu(&self, cpu: CpuId) {
        let proc = self.current.lock().unwrap()[cpu].take();

        if let Some(proc) = proc {
            proc.set_state(ProcState::Waiting);
        }

        self.schedule(cpu);
    }

    /// Called when the process on `cpu` completes. A no-op on an already-idle
    /// CPU, apart from rescheduling.
    pub fn terminate(&self, cpu: CpuId) {
        let proc = self.current.lock().unwrap()[cpu].take();

        if let Some(proc) = proc {
            proc.set_state(ProcState::Terminated);
        }

        self.schedule(cpu);
    }

    /// Called when a process finishes I/O, and once at launch to raise a new
    /// process into the scheduler. Enqueues the process; under PA and SRTF it
    /// then probes the running table and asks the simulator to preempt the
    /// worst-placed CPU when the waker beats it. The waker itself is not
    /// scheduled here; an idle CPU or the preemption target picks it up.
    pub fn wake_up(&self, proc: &Arc<Proc>) {
        proc.set_state(ProcState::Ready);
        self.enqueue(proc.clone());

        match self.policy {
            Policy::PriorityAging { age_weight } => {
                let now = self.sim.current_time();

                self.preempt_probe(proc, |p| priority_with_age(now, p, age_weight));
            }
            Policy::Srtf => {
                self.preempt_probe(proc, |p| p.total_remaining() as f64);
            }
            // FCFS never preempts and round-robin relies on its timer.
            Policy::Fcfs | Policy::RoundRobin { .. } => {}
        }
    }

    fn enqueue(&self, proc: Arc<Proc>) {
        let mut ready = self.ready.lock().unwrap();

        ready.push(proc, self.sim.current_time());
        self.queue_not_empty.notify_one();
    }

    /// Picks the next process for `cpu` and hands it to the simulator.
    ///
    /// The queue and the running table are locked in sequence, never
    /// together, and no lock is held across the context switch.
    fn schedule(&self, cpu: CpuId) {
        let next = {
            let mut ready = self.ready.lock().unwrap();

            self.select(&mut ready)
        };

        self.current.lock().unwrap()[cpu] = next.clone();

        if let Some(proc) = &next {
            // Safe without a lock: the record is out of the queue and no event
            // handler can observe it as ready or waiting until the simulator
            // runs it.
            proc.set_state(ProcState::Running);
        }

        let slice = match self.policy {
            Policy::RoundRobin { time_slice } => Some(time_slice),
            _ => None,
        };

        self.sim.context_switch(cpu, next, slice);
    }

    /// Finds the occupied CPU whose process scores worst under `metric`
    /// (larger is worse) and requests its preemption when `waker` beats it
    /// strictly. Does nothing when any CPU is idle; the idle CPU will pick the
    /// waker up by itself.
    fn preempt_probe(&self, waker: &Arc<Proc>, metric: impl Fn(&Proc) -> f64) {
        let worst = {
            let current = self.current.lock().unwrap();
            let mut worst: Option<(CpuId, f64)> = None;

            for (cpu, cell) in current.iter().enumerate() {
                let occupant = match cell {
                    Some(v) => v,
                    None => return,
                };
                let m = metric(occupant);

                // Strict comparison keeps the first of equally bad cells.
                if worst.map_or(true, |(_, w)| m > w) {
                    worst = Some((cpu, m));
                }
            }

            worst
        };

        if let Some((cpu, worst_metric)) = worst {
            if metric(waker) < worst_metric {
                self.sim.force_preempt(cpu);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::Pid;
    use crate::Tick;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::mpsc::{channel, Sender};
    use std::time::Duration;

    /// Scripted collaborator: a settable clock plus a record of every
    /// decision the scheduler hands back.
    struct TestSim {
        now: AtomicU64,
        switches: Mutex<Vec<(CpuId, Option<Pid>, Option<Tick>)>>,
        preempts: Mutex<Vec<CpuId>>,
        on_switch: Mutex<Option<Sender<Option<Pid>>>>,
    }

    impl TestSim {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: AtomicU64::new(0),
                switches: Mutex::new(Vec::new()),
                preempts: Mutex::new(Vec::new()),
                on_switch: Mutex::new(None),
            })
        }

        fn set_time(&self, now: Tick) {
            self.now.store(now, Ordering::Relaxed);
        }

        fn switched_pids(&self) -> Vec<Option<Pid>> {
            self.switches.lock().unwrap().iter().map(|s| s.1).collect()
        }

        fn switches(&self) -> Vec<(CpuId, Option<Pid>, Option<Tick>)> {
            self.switches.lock().unwrap().clone()
        }

        fn preempts(&self) -> Vec<CpuId> {
            self.preempts.lock().unwrap().clone()
        }
    }

    impl Simulator for TestSim {
        fn current_time(&self) -> Tick {
            self.now.load(Ordering::Relaxed)
        }

        fn context_switch(&self, cpu: CpuId, proc: Option<Arc<Proc>>, slice: Option<Tick>) {
            let pid = proc.as_ref().map(|p| p.pid());

            self.switches.lock().unwrap().push((cpu, pid, slice));

            if let Some(tx) = self.on_switch.lock().unwrap().as_ref() {
                tx.send(pid).unwrap();
            }
        }

        fn force_preempt(&self, cpu: CpuId) {
            self.preempts.lock().unwrap().push(cpu);
        }
    }

    fn scheduler(cpus: usize, policy: Policy) -> (Arc<Scheduler>, Arc<TestSim>) {
        let sim = TestSim::new();
        let config = Config::new(cpus, policy).unwrap();

        (Arc::new(Scheduler::new(config, sim.clone())), sim)
    }

    fn proc(pid: u32, priority: u32, arrival: Tick, total: Tick) -> Arc<Proc> {
        Proc::new(Pid::new(pid), format!("p{pid}"), priority, arrival, total)
    }

    /// Checks the structural invariants for every known process: a process is
    /// in the running table exactly when it is `Running`, in the ready queue
    /// exactly when it is `Ready`, and never in two places.
    fn assert_invariants(sched: &Scheduler, procs: &[Arc<Proc>]) {
        let ready = sched.ready.lock().unwrap();
        let current = sched.current.lock().unwrap();

        for p in procs {
            let queued = ready.iter().filter(|q| q.pid() == p.pid()).count();
            let running = current
                .iter()
                .filter(|c| c.as_ref().is_some_and(|c| c.pid() == p.pid()))
                .count();

            match p.state() {
                ProcState::Ready => assert_eq!((queued, running), (1, 0), "pid {}", p.pid()),
                ProcState::Running => assert_eq!((queued, running), (0, 1), "pid {}", p.pid()),
                _ => assert_eq!((queued, running), (0, 0), "pid {}", p.pid()),
            }
        }
    }

    #[test]
    fn fcfs_runs_in_arrival_order() {
        let (sched, sim) = scheduler(1, Policy::Fcfs);
        let a = proc(0, 0, 0, 100);
        let b = proc(1, 0, 2, 100);
        let c = proc(2, 0, 1, 100);

        sched.wake_up(&a);
        sched.wake_up(&b);
        sched.wake_up(&c);
        sched.idle(0);
        sched.terminate(0);
        sched.terminate(0);
        sched.terminate(0);

        // Arrival order, not enqueue order: A(0), C(1), B(2), then idle.
        assert_eq!(
            sim.switched_pids(),
            [
                Some(Pid::new(0)),
                Some(Pid::new(2)),
                Some(Pid::new(1)),
                None
            ]
        );
        assert_eq!(a.state(), ProcState::Terminated);
        assert_invariants(&sched, &[a, b, c]);
    }

    #[test]
    fn fcfs_runs_without_a_timer() {
        let (sched, sim) = scheduler(1, Policy::Fcfs);
        let a = proc(0, 0, 0, 100);

        sched.wake_up(&a);
        sched.idle(0);

        assert_eq!(sim.switches(), [(0, Some(Pid::new(0)), None)]);
    }

    #[test]
    fn round_robin_rotates_on_the_quantum() {
        let (sched, sim) = scheduler(1, Policy::RoundRobin { time_slice: 2 });
        let a = proc(0, 0, 0, 100);
        let b = proc(1, 0, 0, 100);

        sched.wake_up(&a);
        sched.wake_up(&b);
        sched.idle(0);
        sched.preempt(0);
        sched.preempt(0);

        assert_eq!(
            sim.switches(),
            [
                (0, Some(Pid::new(0)), Some(2)),
                (0, Some(Pid::new(1)), Some(2)),
                (0, Some(Pid::new(0)), Some(2)),
            ]
        );
        assert_invariants(&sched, &[a, b]);
    }

    #[test]
    fn preempt_reselects_the_same_process_on_an_empty_queue() {
        let (sched, sim) = scheduler(1, Policy::RoundRobin { time_slice: 1 });
        let a = proc(0, 0, 0, 100);

        sched.wake_up(&a);
        sched.idle(0);
        sched.preempt(0);

        assert_eq!(
            sim.switched_pids(),
            [Some(Pid::new(0)), Some(Pid::new(0))]
        );
        assert_eq!(a.state(), ProcState::Running);
    }

    #[test]
    fn priority_aging_lets_old_processes_overtake() {
        let (sched, sim) = scheduler(1, Policy::PriorityAging { age_weight: 1 });
        let a = proc(0, 10, 0, 100);

        sched.wake_up(&a);
        sched.idle(0);
        sched.terminate(0);

        sim.set_time(5);

        let b = proc(1, 5, 5, 100);
        let c = proc(2, 8, 5, 100);

        sched.wake_up(&b);
        sched.wake_up(&c);
        sched.idle(0);

        // C has been queued since tick 5; at tick 15 its effective priority is
        // 8 - 10 = -2, which beats a fresh priority-3 arrival.
        sim.set_time(15);

        let d = proc(3, 3, 15, 100);

        sched.wake_up(&d);
        sched.terminate(0);

        let picks: Vec<Option<Pid>> = sim
            .switched_pids()
            .into_iter()
            .filter(|p| p.is_some())
            .collect();

        assert_eq!(
            picks,
            [
                Some(Pid::new(0)),
                Some(Pid::new(1)),
                Some(Pid::new(2))
            ]
        );
        assert_eq!(c.state(), ProcState::Running);
        assert_eq!(d.state(), ProcState::Ready);
    }

    #[test]
    fn srtf_wake_up_preempts_the_worst_cpu() {
        let (sched, sim) = scheduler(2, Policy::Srtf);
        let a = proc(0, 0, 0, 100);
        let b = proc(1, 0, 0, 100);
        let c = proc(2, 0, 0, 10);

        sched.wake_up(&a);
        sched.idle(0);
        sched.wake_up(&b);
        sched.idle(1);

        assert!(sim.preempts().is_empty());

        sched.wake_up(&c);

        // No idle CPU; both occupants are at 100 and the tie goes to CPU 0.
        assert_eq!(sim.preempts(), [0]);

        // The simulator honors the request.
        sched.preempt(0);

        assert_eq!(sim.switched_pids().last().unwrap(), &Some(Pid::new(2)));
        assert_eq!(a.state(), ProcState::Ready);
        assert_invariants(&sched, &[a, b, c]);
    }

    #[test]
    fn wake_up_prefers_an_idle_cpu_over_preemption() {
        let (sched, sim) = scheduler(2, Policy::Srtf);
        let a = proc(0, 0, 0, 100);
        let b = proc(1, 0, 0, 1);

        sched.wake_up(&a);
        sched.idle(0);

        // CPU 1 is idle, so even a far better waker must not preempt.
        sched.wake_up(&b);

        assert!(sim.preempts().is_empty());
    }

    #[test]
    fn priority_aging_probe_targets_the_first_worst_cell() {
        let (sched, sim) = scheduler(2, Policy::PriorityAging { age_weight: 0 });
        let a = proc(0, 5, 0, 100);
        let b = proc(1, 5, 0, 100);

        sched.wake_up(&a);
        sched.idle(0);
        sched.wake_up(&b);
        sched.idle(1);

        let c = proc(2, 1, 0, 100);

        sched.wake_up(&c);

        assert_eq!(sim.preempts(), [0]);
    }

    #[test]
    fn fcfs_never_force_preempts() {
        let (sched, sim) = scheduler(1, Policy::Fcfs);
        let a = proc(0, 0, 0, 1000);
        let b = proc(1, 0, 0, 1);

        sched.wake_up(&a);
        sched.idle(0);
        sched.wake_up(&b);

        assert!(sim.preempts().is_empty());
        assert_eq!(b.state(), ProcState::Ready);
    }

    #[test]
    fn yield_then_wake_returns_to_running() {
        let (sched, sim) = scheduler(1, Policy::Fcfs);
        let a = proc(0, 0, 0, 100);

        sched.wake_up(&a);
        sched.idle(0);
        sched.yield_cpu(0);

        assert_eq!(a.state(), ProcState::Waiting);
        assert_invariants(&sched, std::slice::from_ref(&a));

        sched.wake_up(&a);

        assert_eq!(a.state(), ProcState::Ready);

        sched.idle(0);

        assert_eq!(a.state(), ProcState::Running);
        assert_eq!(sim.switched_pids().last().unwrap(), &Some(Pid::new(0)));
    }

    #[test]
    fn terminate_on_an_idle_cpu_is_a_noop() {
        let (sched, sim) = scheduler(1, Policy::Fcfs);

        sched.terminate(0);

        assert_eq!(sim.switched_pids(), [None]);
        assert!(sched.current.lock().unwrap()[0].is_none());
    }

    #[test]
    fn enqueue_stamps_the_current_tick() {
        let (sched, sim) = scheduler(1, Policy::Fcfs);
        let a = proc(0, 0, 0, 100);

        sim.set_time(37);
        sched.wake_up(&a);

        assert_eq!(a.enqueue_time(), 37);
    }

    #[test]
    fn idle_blocks_until_a_wake_up() {
        let (sched, sim) = scheduler(1, Policy::Fcfs);
        let (tx, rx) = channel();

        *sim.on_switch.lock().unwrap() = Some(tx);

        let idler = std::thread::spawn({
            let sched = sched.clone();

            move || sched.idle(0)
        });

        // The queue is empty, so no decision may arrive yet.
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        let a = proc(0, 0, 0, 100);

        sched.wake_up(&a);

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            Some(Pid::new(0))
        );

        idler.join().unwrap();

        assert_eq!(a.state(), ProcState::Running);
    }
}
