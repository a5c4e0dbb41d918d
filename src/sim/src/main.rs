use self::args::Args;
use self::clock::Clock;
use self::log::Logger;
use self::machine::Machine;
use sched::Scheduler;
use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

mod args;
mod clock;
mod log;
mod machine;
mod workload;

fn main() {
    std::process::exit(if run() { 0 } else { -1 });
}

fn run() -> bool {
    let clock = Arc::new(Clock::new());
    let mut logger = Logger::new(clock.clone());

    // Load arguments from either `.os-sim-debug` or the command line.
    let args = if std::env::args().any(|a| a == "--debug") {
        let file = match File::open(".os-sim-debug") {
            Ok(v) => v,
            Err(e) => {
                error!(logger, e, "Failed to open .os-sim-debug");
                return false;
            }
        };

        match Args::from_file(file) {
            Ok(v) => v,
            Err(e) => {
                error!(logger, e, "Failed to read .os-sim-debug");
                return false;
            }
        }
    } else {
        match Args::from_command_line() {
            Ok(v) => v,
            Err(e) => {
                let _ = e.print();
                return false;
            }
        }
    };

    if let Some(path) = &args.log_file {
        match File::create(path) {
            Ok(v) => logger.set_file(v),
            Err(e) => {
                error!(logger, e, "Failed to create {}", path.display());
                return false;
            }
        }
    }

    let logger = Arc::new(logger);

    let config = match args.config() {
        Ok(v) => v,
        Err(e) => {
            error!(logger, e, "Invalid arguments");
            return false;
        }
    };

    if args.tick_ms < 10 {
        warn!(logger, "Ticks below 10 ms make the schedule timing coarse.");
    }

    let jobs = match workload::default_jobs() {
        Ok(v) => v,
        Err(e) => {
            error!(logger, e, "Invalid workload");
            return false;
        }
    };

    info!(logger, "Starting the OS simulator.");
    info!(logger, "CPUs     : {}", config.cpus);
    info!(logger, "Policy   : {}", config.policy);
    info!(logger, "Processes: {}", jobs.len());

    let machine = Machine::new(
        clock,
        logger.clone(),
        jobs,
        config.cpus,
        Duration::from_millis(args.tick_ms),
    );
    let sched = Arc::new(Scheduler::new(config, machine.clone()));

    machine.run(&sched);

    info!(logger, "All processes terminated.");

    true
}
