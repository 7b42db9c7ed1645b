//! Rolling failure-ratio window.
//!
//! # Responsibilities
//! - Map wall-clock time onto a fixed ring of buckets
//! - Zero buckets that rotated out of use before they are reused
//! - Aggregate totals and the failure ratio across the window
//!
//! # Design Decisions
//! - The bucket index is a pure function of `now - start_time`; there is no
//!   moving cursor, so infrequent calls cannot leave the ring misaligned
//! - Storage is fixed at construction (one bucket per slice)
//! - `prepare_window` must run before aggregates are read or written; the
//!   breaker calls it from inside the same critical section
//! - Stale-bucket resets are measured from the last prepared bucket, so a
//!   second `prepare_window` at the same instant never clears a count that
//!   was written after the first

use crate::resilience::bucket::Bucket;
use crate::resilience::config::BreakerConfig;

#[derive(Debug)]
pub struct RollingHealth {
    buckets: Box<[Bucket]>,
    time_window_millis: u64,
    bucket_size_millis: u64,
    start_time: u64,
    last_request_time: u64,
    last_error_time: Option<u64>,
    last_used_bucket_id: usize,
    prepared_bucket_id: usize,
    last_outcome_success: bool,
}

impl RollingHealth {
    /// Create a window starting at `start_time`, sized by a validated config.
    pub fn new(config: &BreakerConfig, start_time: u64) -> Self {
        Self {
            buckets: vec![Bucket::default(); config.number_of_buckets()].into_boxed_slice(),
            time_window_millis: config.time_window_millis(),
            bucket_size_millis: config.bucket_size_millis(),
            start_time,
            last_request_time: start_time,
            last_error_time: None,
            last_used_bucket_id: 0,
            prepared_bucket_id: 0,
            last_outcome_success: false,
        }
    }

    pub fn number_of_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Index of the bucket covering `now`.
    pub fn current_bucket_id(&self, now: u64) -> usize {
        let elapsed = now.saturating_sub(self.start_time);
        let window_elapsed = elapsed % self.time_window_millis;
        ((window_elapsed / self.bucket_size_millis) as usize) % self.buckets.len()
    }

    /// Zero every bucket that went stale since the window was last prepared.
    pub fn prepare_window(&mut self, now: u64) {
        let current = self.current_bucket_id(now);
        let idle = now.saturating_sub(self.last_request_time);
        if idle > self.time_window_millis {
            self.reset_all();
            self.prepared_bucket_id = current;
            return;
        }

        let prepared = self.prepared_bucket_id;
        if current < prepared {
            // ring wrapped
            self.reset_range(0, current);
            self.reset_range(prepared + 1, self.buckets.len() - 1);
        } else if current > prepared {
            self.reset_range(prepared + 1, current);
        }
        self.prepared_bucket_id = current;
    }

    /// Inclusive on both ends; empty when `from > to`.
    fn reset_range(&mut self, from: usize, to: usize) {
        if from > to || from >= self.buckets.len() {
            return;
        }
        for bucket in &mut self.buckets[from..=to] {
            bucket.reset();
        }
    }

    pub fn record_request(&mut self, now: u64) {
        let id = self.current_bucket_id(now);
        self.buckets[id].increment_total(now);
        self.last_used_bucket_id = id;
        self.prepared_bucket_id = id;
        self.last_request_time = now;
    }

    /// Count a failure in the bucket covering `now`; `prepare_window(now)`
    /// must have run first.
    ///
    /// Leaves `last_used_bucket_id` alone; only `record_request` moves it.
    pub fn record_failure(&mut self, now: u64) {
        let id = self.current_bucket_id(now);
        self.buckets[id].increment_failure(now);
        self.last_error_time = Some(now);
        self.last_outcome_success = false;
    }

    /// A success is a request without a failure, so no bucket changes.
    pub fn record_success(&mut self) {
        self.last_outcome_success = true;
    }

    pub fn total_count(&self) -> u64 {
        self.buckets.iter().map(Bucket::total_count).sum()
    }

    pub fn failure_count(&self) -> u64 {
        self.buckets.iter().map(Bucket::failure_count).sum()
    }

    pub fn failure_ratio(&self) -> f64 {
        let total = self.total_count();
        if total == 0 {
            return 0.0;
        }
        self.failure_count() as f64 / total as f64
    }

    pub fn reset_all(&mut self) {
        for bucket in self.buckets.iter_mut() {
            bucket.reset();
        }
    }

    pub fn last_error_time(&self) -> Option<u64> {
        self.last_error_time
    }

    pub fn last_request_time(&self) -> u64 {
        self.last_request_time
    }

    pub fn last_used_bucket_id(&self) -> usize {
        self.last_used_bucket_id
    }

    pub fn last_outcome_success(&self) -> bool {
        self.last_outcome_success
    }

    pub fn bucket(&self, id: usize) -> Option<&Bucket> {
        self.buckets.get(id)
    }
}
