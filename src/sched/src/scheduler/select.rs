use super::Scheduler;
use crate::config::Policy;
use crate::proc::Proc;
use crate::queue::ReadyQueue;
use crate::Tick;
use std::sync::Arc;

/// Effective priority of a queued process at `now`; smaller is more urgent.
/// Every tick of queue residence pulls the value down by `age_weight`, so a
/// starving process eventually beats any newcomer.
pub(super) fn priority_with_age(now: Tick, proc: &Proc, age_weight: u32) -> f64 {
    let age = now.saturating_sub(proc.enqueue_time());

    proc.priority() as f64 - age as f64 * f64::from(age_weight)
}

impl Scheduler {
    /// Runs the active policy's selection rule over the ready queue and
    /// extracts the winner, or [`None`] when the queue is empty.
    ///
    /// Round-robin takes the head outright. The other policies scan the whole
    /// queue: their metric can change while a process waits (aging) or a
    /// wake-up can land a better candidate anywhere in it. Each scan keeps the
    /// first strictly better entry, so equal metrics resolve to the earliest
    /// queue position, which by FIFO order is also the earliest enqueued.
    pub(super) fn select(&self, ready: &mut ReadyQueue) -> Option<Arc<Proc>> {
        match self.policy {
            Policy::RoundRobin { .. } => ready.pop_head(),
            Policy::Fcfs => {
                let mut winner: Option<(usize, Tick)> = None;

                for (i, p) in ready.iter().enumerate() {
                    let arrival = p.arrival_time();

                    if winner.map_or(true, |(_, best)| arrival < best) {
                        winner = Some((i, arrival));
                    }
                }

                ready.extract(winner?.0)
            }
            Policy::PriorityAging { age_weight } => {
                let now = self.sim.current_time();
                let mut winner: Option<(usize, f64, Tick)> = None;

                for (i, p) in ready.iter().enumerate() {
                    let metric = priority_with_age(now, p, age_weight);
                    let better = match winner {
                        None => true,
                        // An exact metric tie goes to the earlier arrival,
                        // wherever it sits in the queue.
                        Some((_, best, arrival)) => {
                            metric < best || (metric == best && p.arrival_time() < arrival)
                        }
                    };

                    if better {
                        winner = Some((i, metric, p.arrival_time()));
                    }
                }

                ready.extract(winner?.0)
            }
            Policy::Srtf => {
                let mut winner: Option<(usize, Tick)> = None;

                for (i, p) in ready.iter().enumerate() {
                    let remaining = p.total_remaining();

                    if winner.map_or(true, |(_, best)| remaining < best) {
                        winner = Some((i, remaining));
                    }
                }

                ready.extract(winner?.0)
            }
        }
    }
}
