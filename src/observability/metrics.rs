//! Metrics registry for quizapi
//!
//! - Counters only; pool gauges are read from the pool at snapshot time
//! - Monotonic increase
//! - Reset only on process start
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters shared by all handlers
///
/// All counters use Relaxed ordering; readers only need eventual values.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Requests answered with 429
    requests_rate_limited: AtomicU64,
    /// Requests rejected by validation
    validation_failures: AtomicU64,
    /// Results stored
    submissions_saved: AtomicU64,
    /// Questions stored by imports
    questions_imported: AtomicU64,
    /// Acquire or query failures
    database_errors: AtomicU64,
    /// Leases handed out
    leases_acquired: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_rate_limited(&self) {
        self.requests_rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_validation_failures(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_submissions_saved(&self) {
        self.submissions_saved.fetch_add(1, Ordering::Relaxed);
    }

    /// Add the number of questions stored by one import
    pub fn add_questions_imported(&self, count: u64) {
        self.questions_imported.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_database_errors(&self) {
        self.database_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_leases_acquired(&self) {
        self.leases_acquired.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all counters as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_rate_limited: self.requests_rate_limited.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            submissions_saved: self.submissions_saved.load(Ordering::Relaxed),
            questions_imported: self.questions_imported.load(Ordering::Relaxed),
            database_errors: self.database_errors.load(Ordering::Relaxed),
            leases_acquired: self.leases_acquired.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_rate_limited: u64,
    pub validation_failures: u64,
    pub submissions_saved: u64,
    pub questions_imported: u64,
    pub database_errors: u64,
    pub leases_acquired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        let snapshot = MetricsRegistry::new().snapshot();
        assert_eq!(snapshot.submissions_saved, 0);
        assert_eq!(snapshot.database_errors, 0);
        assert_eq!(snapshot.leases_acquired, 0);
    }

    #[test]
    fn test_increment_counters() {
        let registry = MetricsRegistry::new();

        registry.increment_rate_limited();
        registry.increment_validation_failures();
        registry.increment_validation_failures();
        registry.increment_submissions_saved();
        registry.add_questions_imported(12);
        registry.increment_database_errors();
        registry.increment_leases_acquired();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.requests_rate_limited, 1);
        assert_eq!(snapshot.validation_failures, 2);
        assert_eq!(snapshot.submissions_saved, 1);
        assert_eq!(snapshot.questions_imported, 12);
        assert_eq!(snapshot.database_errors, 1);
        assert_eq!(snapshot.leases_acquired, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let registry = MetricsRegistry::new();
        registry.increment_submissions_saved();

        let json = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(json["submissions_saved"], 1);
        assert_eq!(json["requests_rate_limited"], 0);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let reg = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    reg.increment_leases_acquired();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.snapshot().leases_acquired, 1000);
    }
}
