//! One time slice of the rolling window.

/// Request and failure counters for a single bucket.
///
/// Buckets have no locking of their own; the owning [`RollingHealth`] is
/// only ever mutated under the breaker's write lock.
///
/// [`RollingHealth`]: super::rolling::RollingHealth
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bucket {
    total_count: u64,
    failure_count: u64,
    last_updated: Option<u64>,
}

impl Bucket {
    pub fn increment_total(&mut self, now: u64) {
        self.total_count += 1;
        self.last_updated = Some(now);
    }

    pub fn increment_failure(&mut self, now: u64) {
        self.failure_count += 1;
        self.last_updated = Some(now);
    }

    pub fn reset(&mut self) {
        self.total_count = 0;
        self.failure_count = 0;
        self.last_updated = None;
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count
    }

    /// Epoch millis of the last increment, `None` after a reset.
    pub fn last_updated(&self) -> Option<u64> {
        self.last_updated
    }
}
