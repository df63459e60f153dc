use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Shared progress and cancellation handle for long analyses.
///
/// Cloning shares the same counters, so a caller can keep one clone to poll
/// or cancel while the analysis runs on another thread.
#[derive(Debug, Clone)]
pub struct RunProgress {
    /// Completed evaluations
    completed: Arc<AtomicUsize>,
    /// Evaluations requested
    total: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunProgress {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            completed: Arc::new(AtomicUsize::new(0)),
            total: Arc::new(AtomicUsize::new(total)),
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// Share existing atomics with a host application
    pub fn from_atomics(
        completed: Arc<AtomicUsize>,
        total: Arc<AtomicUsize>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            completed,
            total,
            cancelled,
            deadline: None,
        }
    }

    /// Stop the run once `timeout` has elapsed from now
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn increment(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset counters for a new run; the cancel flag is left alone
    pub fn reset(&self, total: usize) {
        self.completed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// True once cancelled or past the deadline. Checked between evaluations.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.cancel();
                true
            }
            _ => false,
        }
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let progress = RunProgress::new(10);
        let handle = progress.clone();
        progress.increment();
        progress.increment();
        assert_eq!(handle.completed(), 2);
        assert_eq!(handle.total(), 10);

        handle.cancel();
        assert!(progress.is_cancelled());
    }

    #[test]
    fn test_deadline_cancels() {
        let progress = RunProgress::new(1).with_timeout(Duration::ZERO);
        assert!(progress.is_cancelled());
        let unlimited = RunProgress::new(1).with_timeout(Duration::from_secs(3600));
        assert!(!unlimited.is_cancelled());
    }

    #[test]
    fn test_reset() {
        let progress = RunProgress::new(3);
        progress.increment();
        progress.reset(5);
        assert_eq!(progress.completed(), 0);
        assert_eq!(progress.total(), 5);
    }
}
