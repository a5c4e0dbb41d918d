use crate::clock::Clock;
use crate::info;
use crate::log::Logger;
use crate::workload::{Job, Op};
use sched::{CpuId, Proc, ProcState, Scheduler, Simulator, Tick};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// The simulated machine: the collaborator half of the scheduling protocol.
///
/// Owns the clock, one thread per simulated CPU, and an I/O thread that also
/// launches processes at their arrival times. CPU threads execute whatever
/// decision the scheduler delivers through [`Simulator::context_switch`] and
/// raise `preempt`, `yield_cpu` and `terminate` events back as their
/// simulated programs dictate.
pub struct Machine {
    clock: Arc<Clock>,
    logger: Arc<Logger>,
    tick_len: Duration,
    jobs: Vec<Arc<Job>>,
    cpus: Vec<CpuSlot>,
    io: Mutex<Vec<IoWait>>,
    done: AtomicBool,
}

/// Per-CPU mailbox between the scheduler and the CPU thread. Only the owning
/// CPU's thread ever consumes it; the scheduler fills it from that same
/// thread's event handlers.
struct CpuSlot {
    assignment: Mutex<Option<Assignment>>,
    preempt_requested: AtomicBool,
}

struct Assignment {
    proc: Option<Arc<Proc>>,
    slice: Option<Tick>,
}

struct IoWait {
    job: Arc<Job>,
    remaining: Tick,
}

impl Machine {
    pub fn new(
        clock: Arc<Clock>,
        logger: Arc<Logger>,
        jobs: Vec<Arc<Job>>,
        cpus: usize,
        tick_len: Duration,
    ) -> Arc<Self> {
        let cpus = (0..cpus)
            .map(|_| CpuSlot {
                assignment: Mutex::new(None),
                preempt_requested: AtomicBool::new(false),
            })
            .collect();

        Arc::new(Self {
            clock,
            logger,
            tick_len,
            jobs,
            cpus,
            io: Mutex::new(Vec::new()),
            done: AtomicBool::new(false),
        })
    }

    /// Runs the simulation to completion: spawns the timer, I/O and CPU
    /// threads, then waits until every process has terminated.
    ///
    /// CPU threads parked inside [`Scheduler::idle`] at that point are left
    /// behind; they die with the process, like CPUs halted at power-off.
    pub fn run(self: &Arc<Self>, sched: &Arc<Scheduler>) {
        for cpu in 0..self.cpus.len() {
            let machine = self.clone();
            let sched = sched.clone();

            thread::Builder::new()
                .name(format!("cpu{cpu}"))
                .spawn(move || machine.cpu_main(&sched, cpu))
                .unwrap();
        }

        let timer = thread::Builder::new()
            .name("timer".into())
            .spawn({
                let machine = self.clone();

                move || machine.timer_main()
            })
            .unwrap();

        let io = thread::Builder::new()
            .name("io".into())
            .spawn({
                let machine = self.clone();
                let sched = sched.clone();

                move || machine.io_main(&sched)
            })
            .unwrap();

        io.join().unwrap();

        self.done.store(true, Ordering::Relaxed);
        timer.join().unwrap();
    }

    fn timer_main(&self) {
        while !self.done.load(Ordering::Relaxed) {
            thread::sleep(self.tick_len);
            self.clock.advance();
        }
    }

    fn cpu_main(&self, sched: &Arc<Scheduler>, cpu: CpuId) {
        loop {
            let assignment = self.cpus[cpu].assignment.lock().unwrap().take();

            match assignment {
                Some(Assignment {
                    proc: Some(proc),
                    slice,
                }) => self.run_burst(sched, cpu, &proc, slice),
                // Nothing to run; block until the queue fills up again.
                _ => sched.idle(cpu),
            }
        }
    }

    /// Simulates `proc` until its CPU burst completes, its quantum runs out
    /// or a forced preemption lands, then raises the matching event.
    fn run_burst(&self, sched: &Arc<Scheduler>, cpu: CpuId, proc: &Arc<Proc>, slice: Option<Tick>) {
        let job = self.job_of(proc);

        // A fresh burst; a preempted process resumes where it left off.
        if proc.burst_remaining() == 0 {
            match job.current_op() {
                Op::Cpu(ticks) => proc.set_burst_remaining(ticks),
                op => unreachable!("{} scheduled mid-{op:?}", proc.pid()),
            }
        }

        let mut used: Tick = 0;

        while proc.burst_remaining() > 0 {
            if self.cpus[cpu].preempt_requested.swap(false, Ordering::Relaxed) {
                sched.preempt(cpu);
                return;
            }

            if slice.is_some_and(|quantum| used >= quantum) {
                info!(
                    self.logger,
                    "cpu{cpu}: quantum expired for {} ({})",
                    proc.pid(),
                    proc.name()
                );
                sched.preempt(cpu);
                return;
            }

            thread::sleep(self.tick_len);
            proc.consume_burst_tick();
            used += 1;
        }

        match job.advance() {
            Op::Io(ticks) => {
                info!(
                    self.logger,
                    "cpu{cpu}: {} ({}) starts {ticks} tick(s) of i/o",
                    proc.pid(),
                    proc.name()
                );
                sched.yield_cpu(cpu);

                // The process is in the machine's hands from here until the
                // I/O completes.
                self.io.lock().unwrap().push(IoWait {
                    job: job.clone(),
                    remaining: ticks,
                });
            }
            Op::Terminate => {
                info!(
                    self.logger,
                    "cpu{cpu}: {} ({}) terminated",
                    proc.pid(),
                    proc.name()
                );
                sched.terminate(cpu);
            }
            // The workload validator only admits alternating programs.
            Op::Cpu(_) => unreachable!("cpu burst directly after a cpu burst"),
        }
    }

    fn io_main(&self, sched: &Arc<Scheduler>) {
        let mut launched = vec![false; self.jobs.len()];

        loop {
            thread::sleep(self.tick_len);

            let now = self.clock.now();

            for (i, job) in self.jobs.iter().enumerate() {
                if !launched[i] && job.proc().arrival_time() <= now {
                    launched[i] = true;
                    info!(
                        self.logger,
                        "{} ({}) arrives",
                        job.proc().pid(),
                        job.proc().name()
                    );
                    sched.wake_up(job.proc());
                }
            }

            let mut woken = Vec::new();

            self.io.lock().unwrap().retain_mut(|wait| {
                wait.remaining -= 1;
                wait.job.proc().consume_io_tick();

                if wait.remaining == 0 {
                    woken.push(wait.job.clone());
                    false
                } else {
                    true
                }
            });

            // Wake-ups happen outside the I/O list lock; wake_up calls back
            // into the machine.
            for job in woken {
                info!(
                    self.logger,
                    "{} ({}) finishes i/o",
                    job.proc().pid(),
                    job.proc().name()
                );
                job.advance();
                sched.wake_up(job.proc());
            }

            if self
                .jobs
                .iter()
                .all(|j| j.proc().state() == ProcState::Terminated)
            {
                break;
            }
        }
    }

    fn job_of(&self, proc: &Arc<Proc>) -> &Arc<Job> {
        let job = &self.jobs[proc.pid().value() as usize];

        debug_assert_eq!(job.proc().pid(), proc.pid());

        job
    }
}

impl Simulator for Machine {
    fn current_time(&self) -> Tick {
        self.clock.now()
    }

    fn context_switch(&self, cpu: CpuId, proc: Option<Arc<Proc>>, slice: Option<Tick>) {
        match &proc {
            Some(p) => info!(self.logger, "cpu{cpu}: running {} ({})", p.pid(), p.name()),
            None => info!(self.logger, "cpu{cpu}: idle"),
        }

        let slot = &self.cpus[cpu];

        // A preemption request aimed at the previous occupant dies with it.
        slot.preempt_requested.store(false, Ordering::Relaxed);
        *slot.assignment.lock().unwrap() = Some(Assignment { proc, slice });
    }

    fn force_preempt(&self, cpu: CpuId) {
        info!(self.logger, "cpu{cpu}: preemption requested");
        self.cpus[cpu].preempt_requested.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::default_jobs;
    use sched::{Config, Policy};

    #[test]
    fn simulation_runs_to_completion() {
        let clock = Arc::new(Clock::new());
        let logger = Arc::new(Logger::new(clock.clone()));
        let jobs = default_jobs().unwrap();
        let config = Config::new(2, Policy::RoundRobin { time_slice: 1 }).unwrap();
        let machine = Machine::new(clock, logger, jobs, config.cpus, Duration::from_millis(1));
        let sched = Arc::new(Scheduler::new(config, machine.clone()));

        machine.run(&sched);

        assert!(machine
            .jobs
            .iter()
            .all(|j| j.proc().state() == ProcState::Terminated));
    }
}
