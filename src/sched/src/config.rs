use crate::Tick;
use std::fmt;
use thiserror::Error;

/// Maximum number of simulated CPUs.
pub const MAX_CPUS: usize = 16;

/// Scheduling policy, carrying its per-policy parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// First-come first-served. Non-preemptive.
    Fcfs,

    /// Round-robin with a fixed quantum, in ticks.
    RoundRobin { time_slice: Tick },

    /// Static priority softened by queue-residence time. Preempts on wake-up.
    PriorityAging { age_weight: u32 },

    /// Shortest remaining time first. Preempts on wake-up.
    Srtf,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Fcfs => f.write_str("FCFS"),
            Self::RoundRobin { time_slice } => {
                write!(f, "Round-Robin ({time_slice} tick slice)")
            }
            Self::PriorityAging { age_weight } => {
                write!(f, "Priority Aging (weight {age_weight})")
            }
            Self::Srtf => f.write_str("SRTF"),
        }
    }
}

/// Scheduler construction parameters, validated once at startup.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub cpus: usize,
    pub policy: Policy,
}

impl Config {
    pub fn new(cpus: usize, policy: Policy) -> Result<Self, ConfigError> {
        if cpus == 0 || cpus > MAX_CPUS {
            return Err(ConfigError::InvalidCpuCount(cpus));
        }

        if let Policy::RoundRobin { time_slice } = policy {
            if time_slice == 0 {
                return Err(ConfigError::InvalidTimeSlice);
            }
        }

        Ok(Self { cpus, policy })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cpu count {0} is outside 1-{MAX_CPUS}")]
    InvalidCpuCount(usize),

    #[error("round-robin time slice must be at least one tick")]
    InvalidTimeSlice,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_count_bounds() {
        assert!(Config::new(0, Policy::Fcfs).is_err());
        assert!(Config::new(MAX_CPUS + 1, Policy::Fcfs).is_err());
        assert!(Config::new(1, Policy::Fcfs).is_ok());
        assert!(Config::new(MAX_CPUS, Policy::Srtf).is_ok());
    }

    #[test]
    fn round_robin_needs_a_slice() {
        assert!(Config::new(2, Policy::RoundRobin { time_slice: 0 }).is_err());
        assert!(Config::new(2, Policy::RoundRobin { time_slice: 1 }).is_ok());
    }
}
