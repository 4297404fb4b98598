use std::sync::atomic::{AtomicU64, Ordering};

/// One bit per worker; a set bit means that worker last saw an empty
/// frontier. All bits set is the termination consensus.
#[derive(Debug)]
pub struct TasksState {
    bits: AtomicU64,
    full: u64,
}

impl TasksState {
    /// Panics unless `size` is in `1..=64`; one bit per worker.
    pub fn new(size: usize) -> TasksState {
        assert!(
            (1..=64).contains(&size),
            "worker pool size must be in 1..=64, got {}",
            size
        );

        let full = if size == 64 {
            u64::MAX
        } else {
            (1u64 << size) - 1
        };

        TasksState {
            bits: AtomicU64::new(0),
            full,
        }
    }

    pub fn set_idle(&self, task_idx: usize) {
        self.bits.fetch_or(1 << task_idx, Ordering::AcqRel);
    }

    /// Any dequeue voids a pending termination consensus.
    pub fn clear_all(&self) {
        self.bits.store(0, Ordering::Release);
    }

    pub fn all_idle(&self) -> bool {
        self.bits.load(Ordering::Acquire) == self.full
    }
}
