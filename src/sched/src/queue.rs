use crate::proc::Proc;
use crate::Tick;
use std::collections::VecDeque;
use std::sync::Arc;

/// The ready queue.
///
/// A FIFO of runnable processes. Insertion order is preserved; which entry
/// leaves first is the selector's decision, so extraction works on any
/// position, not only the head. A process is linked here exactly while its
/// state is `Ready`, and never twice.
#[derive(Debug, Default)]
pub(crate) struct ReadyQueue {
    procs: VecDeque<Arc<Proc>>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self {
            procs: VecDeque::new(),
        }
    }

    /// Appends `proc` at the tail, stamping its enqueue time with `now`.
    ///
    /// The process must not already be linked; enqueueing it twice is a
    /// programming error.
    pub fn push(&mut self, proc: Arc<Proc>, now: Tick) {
        debug_assert!(
            self.procs.iter().all(|q| q.pid() != proc.pid()),
            "process {} enqueued twice",
            proc.pid()
        );

        proc.set_enqueue_time(now);
        self.procs.push_back(proc);
    }

    /// Removes and returns the head, or [`None`] when the queue is empty.
    pub fn pop_head(&mut self) -> Option<Arc<Proc>> {
        self.procs.pop_front()
    }

    /// Unlinks and returns the process at `index`, closing the gap so the
    /// survivors keep their relative order.
    pub fn extract(&mut self, index: usize) -> Option<Arc<Proc>> {
        self.procs.remove(index)
    }

    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Proc>> {
        self.procs.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.procs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::Pid;

    fn proc(pid: u32) -> Arc<Proc> {
        Proc::new(Pid::new(pid), format!("p{pid}"), 0, 0, 10)
    }

    #[test]
    fn push_stamps_enqueue_time() {
        let mut q = ReadyQueue::new();
        let p = proc(0);

        q.push(p.clone(), 42);

        assert_eq!(p.enqueue_time(), 42);
    }

    #[test]
    fn pop_is_fifo() {
        let mut q = ReadyQueue::new();

        for pid in 0..3 {
            q.push(proc(pid), 0);
        }

        for pid in 0..3 {
            assert_eq!(q.pop_head().unwrap().pid(), Pid::new(pid));
        }

        assert!(q.pop_head().is_none());
        assert!(q.is_empty());
    }

    #[test]
    fn extract_preserves_survivor_order() {
        let mut q = ReadyQueue::new();

        for pid in 0..4 {
            q.push(proc(pid), 0);
        }

        assert_eq!(q.extract(1).unwrap().pid(), Pid::new(1));
        assert_eq!(q.len(), 3);

        let order: Vec<u32> = q.iter().map(|p| p.pid().value()).collect();

        assert_eq!(order, [0, 2, 3]);
    }

    #[test]
    fn extract_at_tail() {
        let mut q = ReadyQueue::new();

        for pid in 0..3 {
            q.push(proc(pid), 0);
        }

        assert_eq!(q.extract(2).unwrap().pid(), Pid::new(2));

        // The tail must now be the old predecessor.
        q.push(proc(9), 0);

        let order: Vec<u32> = q.iter().map(|p| p.pid().value()).collect();

        assert_eq!(order, [0, 1, 9]);
    }

    #[test]
    fn extract_only_element_empties_the_queue() {
        let mut q = ReadyQueue::new();

        q.push(proc(7), 0);

        assert_eq!(q.extract(0).unwrap().pid(), Pid::new(7));
        assert!(q.is_empty());
        assert!(q.extract(0).is_none());
    }
}
