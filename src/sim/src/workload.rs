use sched::{Pid, Proc, Tick};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// One step of a simulated program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Compute for the given number of ticks.
    Cpu(Tick),

    /// Wait for I/O for the given number of ticks.
    Io(Tick),

    /// Exit.
    Terminate,
}

/// A process together with the program the machine simulates for it.
///
/// The program alternates CPU bursts with I/O waits and ends in termination;
/// the program counter is only ever advanced by the thread that owns the
/// process at that moment (the CPU thread running it, or the I/O thread while
/// it waits).
#[derive(Debug)]
pub struct Job {
    proc: Arc<Proc>,
    program: Vec<Op>,
    pc: AtomicUsize,
}

impl Job {
    pub fn new(
        pid: Pid,
        name: &str,
        priority: u32,
        arrival: Tick,
        program: Vec<Op>,
    ) -> Result<Arc<Self>, WorkloadError> {
        validate(pid, &program)?;

        let total = program
            .iter()
            .map(|op| match op {
                Op::Cpu(t) | Op::Io(t) => *t,
                Op::Terminate => 0,
            })
            .sum();

        Ok(Arc::new(Self {
            proc: Proc::new(pid, name, priority, arrival, total),
            program,
            pc: AtomicUsize::new(0),
        }))
    }

    pub fn proc(&self) -> &Arc<Proc> {
        &self.proc
    }

    /// The op the process is currently executing.
    pub fn current_op(&self) -> Op {
        self.program[self.pc.load(Ordering::Relaxed)]
    }

    /// Moves to the next op and returns it.
    pub fn advance(&self) -> Op {
        let pc = self.pc.fetch_add(1, Ordering::Relaxed) + 1;

        self.program[pc]
    }
}

fn validate(pid: Pid, program: &[Op]) -> Result<(), WorkloadError> {
    match program.last() {
        None => return Err(WorkloadError::EmptyProgram(pid)),
        Some(Op::Terminate) => {}
        Some(_) => return Err(WorkloadError::MissingTerminate(pid)),
    }

    if !matches!(program.first(), Some(Op::Cpu(t)) if *t > 0) {
        return Err(WorkloadError::MustStartWithCpu(pid));
    }

    for pair in program.windows(2) {
        let bad = match pair {
            // Zero-length bursts and back-to-back bursts of the same kind
            // would stall the machine's op bookkeeping.
            [Op::Cpu(0), _] | [Op::Io(0), _] => true,
            [Op::Cpu(_), Op::Cpu(_)] => true,
            [Op::Io(_), Op::Io(_)] => true,
            // A process exits from the CPU, never out of an I/O wait.
            [Op::Io(_), Op::Terminate] => true,
            [Op::Terminate, _] => true,
            _ => false,
        };

        if bad {
            return Err(WorkloadError::MalformedProgram(pid));
        }
    }

    Ok(())
}

/// The stock demo workload: four interactive processes with short CPU bursts
/// between I/O waits, and four batch processes that mostly compute. Arrival
/// times are staggered so idle CPUs, wake-up preemption and aging all get
/// exercised.
pub fn default_jobs() -> Result<Vec<Arc<Job>>, WorkloadError> {
    use Op::{Cpu, Io, Terminate};

    let specs: Vec<(&str, u32, Tick, Vec<Op>)> = vec![
        (
            "shell",
            1,
            0,
            vec![Cpu(1), Io(2), Cpu(1), Io(3), Cpu(1), Io(2), Cpu(1), Terminate],
        ),
        (
            "editor",
            2,
            0,
            vec![Cpu(1), Io(3), Cpu(2), Io(2), Cpu(1), Terminate],
        ),
        (
            "browser",
            2,
            1,
            vec![Cpu(2), Io(4), Cpu(1), Io(2), Cpu(2), Terminate],
        ),
        (
            "mailer",
            3,
            3,
            vec![Cpu(1), Io(4), Cpu(1), Io(4), Cpu(1), Terminate],
        ),
        (
            "compiler",
            6,
            1,
            vec![Cpu(5), Io(1), Cpu(6), Io(1), Cpu(4), Terminate],
        ),
        ("raytrace", 8, 2, vec![Cpu(7), Io(2), Cpu(8), Terminate]),
        ("archiver", 7, 4, vec![Cpu(4), Io(3), Cpu(5), Terminate]),
        ("indexer", 9, 6, vec![Cpu(6), Io(2), Cpu(6), Terminate]),
    ];

    specs
        .into_iter()
        .enumerate()
        .map(|(pid, (name, priority, arrival, program))| {
            Job::new(Pid::new(pid as u32), name, priority, arrival, program)
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("process {0} has an empty program")]
    EmptyProgram(Pid),

    #[error("process {0} does not end with terminate")]
    MissingTerminate(Pid),

    #[error("process {0} must start with a cpu burst")]
    MustStartWithCpu(Pid),

    #[error("process {0} has a malformed op sequence")]
    MalformedProgram(Pid),
}
