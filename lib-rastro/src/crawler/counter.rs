use std::sync::atomic::{AtomicUsize, Ordering};

/// Run statistics for the end-of-crawl summary.
#[derive(Debug, Default)]
pub struct Counter {
    /// All URLs finished, no matter the outcome.
    closed_count: AtomicUsize,
    /// URLs finished without any usable response.
    error_count: AtomicUsize,
}

impl Counter {
    pub fn register_closed(&self) {
        self.closed_count.fetch_add(1, Ordering::Release);
    }

    /// An errored URL still counts as closed.
    pub fn register_error(&self) {
        self.register_closed();
        self.error_count.fetch_add(1, Ordering::Release);
    }

    pub fn n_closed(&self) -> usize {
        self.closed_count.load(Ordering::Acquire)
    }

    pub fn n_error(&self) -> usize {
        self.error_count.load(Ordering::Acquire)
    }
}
