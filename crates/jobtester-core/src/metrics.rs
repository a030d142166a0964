//! Run-level counters.
//!
//! Every counter only ever goes up. Increments take the write lock for a
//! single addition; `snapshot` takes the read lock and copies.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

/// Counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_jobs: u64,
    pub total_jobs_tester_error: u64,
    pub total_jobs_passed: u64,
    pub total_jobs_failed: u64,
    pub expected_total_jobs: u64,
    /// Stats records the collector did not accept. Independent of job outcome.
    pub total_stats_delivery_failed: u64,
}

impl MetricsSnapshot {
    /// Every attempted job landed in exactly one outcome bucket.
    pub fn is_balanced(&self) -> bool {
        self.total_jobs
            == self.total_jobs_passed + self.total_jobs_failed + self.total_jobs_tester_error
    }
}

/// Thread-safe run counters.
#[derive(Debug, Default)]
pub struct RunMetrics {
    inner: RwLock<MetricsSnapshot>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_total_jobs(&self) {
        self.write().total_jobs += 1;
    }

    pub fn increment_tester_error(&self) {
        self.write().total_jobs_tester_error += 1;
    }

    pub fn increment_passed(&self) {
        self.write().total_jobs_passed += 1;
    }

    pub fn increment_failed(&self) {
        self.write().total_jobs_failed += 1;
    }

    /// Record the counting pass in one step.
    pub fn add_expected(&self, n: u64) {
        self.write().expected_total_jobs += n;
    }

    pub fn increment_delivery_failed(&self) {
        self.write().total_stats_delivery_failed += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        *self.read()
    }

    // A panic while holding the lock cannot leave a half-applied `+= 1`,
    // so poisoned guards are safe to reuse.
    fn write(&self) -> RwLockWriteGuard<'_, MetricsSnapshot> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> RwLockReadGuard<'_, MetricsSnapshot> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn increments_are_independent() {
        let metrics = RunMetrics::new();
        metrics.increment_total_jobs();
        metrics.increment_total_jobs();
        metrics.increment_passed();
        metrics.increment_failed();
        metrics.add_expected(3);

        let snap = metrics.snapshot();
        assert_eq!(snap.total_jobs, 2);
        assert_eq!(snap.total_jobs_passed, 1);
        assert_eq!(snap.total_jobs_failed, 1);
        assert_eq!(snap.total_jobs_tester_error, 0);
        assert_eq!(snap.expected_total_jobs, 3);
        assert!(snap.is_balanced());
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let metrics = Arc::new(RunMetrics::new());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.increment_total_jobs();
                        if i % 2 == 0 {
                            metrics.increment_passed();
                        } else {
                            metrics.increment_failed();
                        }
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.total_jobs, 8000);
        assert_eq!(snap.total_jobs_passed, 4000);
        assert_eq!(snap.total_jobs_failed, 4000);
        assert!(snap.is_balanced());
    }

    #[test]
    fn snapshot_serializes_summary_keys() {
        let json = serde_json::to_value(RunMetrics::new().snapshot()).unwrap();
        for key in [
            "total_jobs",
            "total_jobs_tester_error",
            "total_jobs_passed",
            "total_jobs_failed",
            "expected_total_jobs",
            "total_stats_delivery_failed",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }
}
