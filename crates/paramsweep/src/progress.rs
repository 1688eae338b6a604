//! Shared progress and cancellation state for an iteration pass.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

/// Progress tracking for a sweep pass.
///
/// Clones share the same counters, so workers and the consumer observe one
/// another's updates.
#[derive(Debug, Clone)]
pub struct SweepProgress {
    /// Completed points counter
    completed: Arc<AtomicUsize>,
    /// Total points in the pass
    total: usize,
    /// Cancellation flag
    cancelled: Arc<AtomicBool>,
}

impl SweepProgress {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            completed: Arc::new(AtomicUsize::new(0)),
            total,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Increment the completed counter, returning the new count
    pub fn increment(&self) -> usize {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Record one finished point and log throughput roughly every tenth of
    /// the pass.
    ///
    /// `count_offset` points were already done before this pass started.
    pub fn record(&self, count_offset: usize, count_total: usize, start_time: Instant) {
        let done = self.increment();
        let pass_total = self.total();
        let step = (pass_total / 10).max(1);
        if done % step != 0 && done != pass_total {
            return;
        }

        let elapsed = start_time.elapsed();
        let per_point = elapsed.as_secs_f64() / done as f64;
        let remaining = pass_total.saturating_sub(done);
        tracing::info!(
            completed = count_offset + done,
            total = count_total,
            elapsed_secs = elapsed.as_secs_f64(),
            eta_secs = per_point * remaining as f64,
            "Sweep progress"
        );
    }
}

impl Default for SweepProgress {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let progress = SweepProgress::new(4);
        let worker = progress.clone();
        worker.increment();
        worker.record(0, 4, Instant::now());
        assert_eq!(progress.completed(), 2);
        assert_eq!(progress.total(), 4);

        worker.cancel();
        assert!(progress.is_cancelled());
    }
}
