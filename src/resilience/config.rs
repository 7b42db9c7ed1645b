//! Validated breaker configuration.
//!
//! Raw values arrive as [`BreakerParameters`] (signed, unchecked) and become
//! an immutable [`BreakerConfig`] only if every rule holds. Validation runs
//! at construction; a breaker never starts with a config that could fail
//! later.

use std::collections::BTreeSet;

use crate::resilience::category::FailureCategory;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BreakerConfigError {
    #[error("failure_threshold must be within [0, 1], got {0}")]
    FailureThresholdOutOfRange(f64),

    #[error("request_volume_threshold must be greater than 0, got {0}")]
    NonPositiveVolumeThreshold(i64),

    #[error("reset_time_millis must be greater than 0, got {0}")]
    NonPositiveResetTime(i64),

    #[error("bucket_size_millis must be greater than 0, got {0}")]
    NonPositiveBucketSize(i64),

    #[error("time_window_millis ({window}) must be at least bucket_size_millis ({bucket})")]
    WindowSmallerThanBucket { window: i64, bucket: i64 },

    #[error("time_window_millis ({window}) must be a multiple of bucket_size_millis ({bucket})")]
    UnevenWindow { window: i64, bucket: i64 },
}

/// Unvalidated breaker settings, all times in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerParameters {
    pub request_volume_threshold: i64,
    pub time_window_millis: i64,
    pub bucket_size_millis: i64,
    pub failure_threshold: f64,
    pub reset_time_millis: i64,
    pub failure_categories: Vec<FailureCategory>,
}

impl Default for BreakerParameters {
    fn default() -> Self {
        Self {
            request_volume_threshold: 10,
            time_window_millis: 60_000,
            bucket_size_millis: 10_000,
            failure_threshold: 0.5,
            reset_time_millis: 30_000,
            failure_categories: vec![
                FailureCategory::ConnectionError,
                FailureCategory::TransientError,
            ],
        }
    }
}

impl BreakerParameters {
    /// Every violated rule, in a stable order.
    pub fn validate(&self) -> Vec<BreakerConfigError> {
        let mut errors = Vec::new();

        if !(0.0..=1.0).contains(&self.failure_threshold) {
            errors.push(BreakerConfigError::FailureThresholdOutOfRange(
                self.failure_threshold,
            ));
        }
        if self.request_volume_threshold <= 0 {
            errors.push(BreakerConfigError::NonPositiveVolumeThreshold(
                self.request_volume_threshold,
            ));
        }
        if self.reset_time_millis <= 0 {
            errors.push(BreakerConfigError::NonPositiveResetTime(self.reset_time_millis));
        }

        let window = self.time_window_millis;
        let bucket = self.bucket_size_millis;
        if bucket <= 0 {
            errors.push(BreakerConfigError::NonPositiveBucketSize(bucket));
        } else if window < bucket {
            errors.push(BreakerConfigError::WindowSmallerThanBucket { window, bucket });
        } else if window % bucket != 0 {
            errors.push(BreakerConfigError::UnevenWindow { window, bucket });
        }

        errors
    }
}

/// Immutable, validated configuration for one breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerConfig {
    request_volume_threshold: u64,
    time_window_millis: u64,
    bucket_size_millis: u64,
    failure_threshold: f64,
    reset_time_millis: u64,
    failure_categories: BTreeSet<FailureCategory>,
}

impl BreakerConfig {
    /// Validate `params`, failing on the first broken rule.
    pub fn new(params: BreakerParameters) -> Result<Self, BreakerConfigError> {
        if let Some(err) = params.validate().into_iter().next() {
            return Err(err);
        }
        Ok(Self::from_validated(params))
    }

    fn from_validated(params: BreakerParameters) -> Self {
        Self {
            request_volume_threshold: params.request_volume_threshold as u64,
            time_window_millis: params.time_window_millis as u64,
            bucket_size_millis: params.bucket_size_millis as u64,
            failure_threshold: params.failure_threshold,
            reset_time_millis: params.reset_time_millis as u64,
            failure_categories: params.failure_categories.into_iter().collect(),
        }
    }

    pub fn request_volume_threshold(&self) -> u64 {
        self.request_volume_threshold
    }

    pub fn time_window_millis(&self) -> u64 {
        self.time_window_millis
    }

    pub fn bucket_size_millis(&self) -> u64 {
        self.bucket_size_millis
    }

    pub fn number_of_buckets(&self) -> usize {
        (self.time_window_millis / self.bucket_size_millis) as usize
    }

    pub fn failure_threshold(&self) -> f64 {
        self.failure_threshold
    }

    pub fn reset_time_millis(&self) -> u64 {
        self.reset_time_millis
    }

    pub fn failure_categories(&self) -> &BTreeSet<FailureCategory> {
        &self.failure_categories
    }

    pub fn counts_all_errors(&self) -> bool {
        self.failure_categories.contains(&FailureCategory::AllErrors)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self::from_validated(BreakerParameters::default())
    }
}
