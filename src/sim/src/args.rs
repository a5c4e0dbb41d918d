use clap::{command, value_parser, Arg, ArgAction, ArgGroup, ArgMatches, Command};
use sched::{Config, ConfigError, Policy};
use serde::Deserialize;
use std::io::Read;
use std::path::PathBuf;
use thiserror::Error;

/// One tick of simulated time corresponds to this much wall-clock time by
/// default, and requested round-robin time slices are expressed in it.
const MS_PER_TICK: u64 = 100;

/// Simulator arguments, loaded from either `.os-sim-debug` or the command
/// line.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Args {
    pub cpus: usize,
    #[serde(default)]
    pub round_robin: Option<u64>,
    #[serde(default)]
    pub priority_aging: Option<u32>,
    #[serde(default)]
    pub srtf: bool,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_tick_ms() -> u64 {
    MS_PER_TICK
}

impl Args {
    pub fn from_file(file: impl Read) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_reader(file)
    }

    pub fn from_command_line() -> Result<Self, clap::Error> {
        Ok(Self::from_matches(Self::command().try_get_matches()?))
    }

    /// Folds the raw arguments into a validated scheduler configuration.
    /// FCFS is the default when no policy option is present; the options are
    /// mutually exclusive.
    pub fn config(&self) -> Result<Config, ArgsError> {
        let policy = if let Some(ms) = self.round_robin {
            if ms == 0 {
                return Err(ArgsError::ZeroTimeSlice);
            }

            // Any positive request gets at least one tick.
            Policy::RoundRobin {
                time_slice: (ms / MS_PER_TICK).max(1),
            }
        } else if let Some(age_weight) = self.priority_aging {
            Policy::PriorityAging { age_weight }
        } else if self.srtf {
            Policy::Srtf
        } else {
            Policy::Fcfs
        };

        Ok(Config::new(self.cpus, policy)?)
    }

    fn command() -> Command {
        command!()
            .about("Multithreaded OS scheduling simulator")
            .arg(
                Arg::new("cpus")
                    .help("Number of simulated CPUs (1-16)")
                    .value_name("CPUS")
                    .value_parser(value_parser!(usize))
                    .required(true),
            )
            .arg(
                Arg::new("round_robin")
                    .help("Use the round-robin scheduler with the given time slice, in milliseconds")
                    .short('r')
                    .long("round-robin")
                    .value_name("TIMESLICE_MS")
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                Arg::new("priority_aging")
                    .help("Use the priority-aging scheduler with the given age weight")
                    .short('p')
                    .long("priority-aging")
                    .value_name("AGE_WEIGHT")
                    .value_parser(value_parser!(u32)),
            )
            .arg(
                Arg::new("srtf")
                    .help("Use the shortest-remaining-time-first scheduler")
                    .short('s')
                    .long("srtf")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("tick_ms")
                    .help("Wall-clock milliseconds per simulated tick")
                    .long("tick-ms")
                    .value_name("MS")
                    .value_parser(value_parser!(u64).range(1..))
                    .default_value("100"),
            )
            .arg(
                Arg::new("log_file")
                    .help("Also write the schedule trace to this file, uncolored")
                    .long("log-file")
                    .value_name("PATH")
                    .value_parser(value_parser!(PathBuf)),
            )
            .group(
                ArgGroup::new("policy")
                    .args(["round_robin", "priority_aging", "srtf"])
                    .multiple(false),
            )
    }

    fn from_matches(args: ArgMatches) -> Self {
        Self {
            cpus: *args.get_one::<usize>("cpus").unwrap(),
            round_robin: args.get_one::<u64>("round_robin").copied(),
            priority_aging: args.get_one::<u32>("priority_aging").copied(),
            srtf: args.get_flag("srtf"),
            tick_ms: *args.get_one::<u64>("tick_ms").unwrap(),
            log_file: args.get_one::<PathBuf>("log_file").cloned(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ArgsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("time slice must be greater than zero")]
    ZeroTimeSlice,
}
