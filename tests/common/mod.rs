//! Shared utilities for breaker integration tests.

#![allow(dead_code)]

use std::error::Error;
use std::io;
use std::sync::Arc;

use transfer_breaker::resilience::{
    BreakerConfig, BreakerParameters, CircuitBreaker, FailureCategory, ManualClock,
};
use transfer_breaker::TransferError;

pub const START: u64 = 1_700_000_000_000;

/// V=4, window 10s in two 5s buckets, T=0.5, reset 2s.
pub fn scenario_params(categories: Vec<FailureCategory>) -> BreakerParameters {
    BreakerParameters {
        request_volume_threshold: 4,
        time_window_millis: 10_000,
        bucket_size_millis: 5_000,
        failure_threshold: 0.5,
        reset_time_millis: 2_000,
        failure_categories: categories,
    }
}

pub fn breaker_with(params: BreakerParameters) -> (Arc<CircuitBreaker>, ManualClock) {
    let clock = ManualClock::new(START);
    let config = BreakerConfig::new(params).expect("valid test config");
    let breaker = CircuitBreaker::with_clock("ftp-test", config, Arc::new(clock.clone()))
        .with_categorizer(TransferError::categorizer());
    (Arc::new(breaker), clock)
}

pub fn scenario_breaker() -> (Arc<CircuitBreaker>, ManualClock) {
    breaker_with(scenario_params(vec![FailureCategory::ConnectionError]))
}

pub fn refused() -> TransferError {
    TransferError::Connect {
        host: "ftp.test".into(),
        source: io::Error::from(io::ErrorKind::ConnectionRefused),
    }
}

pub fn login_incorrect() -> TransferError {
    TransferError::Reply {
        code: 530,
        message: "Login incorrect.".into(),
    }
}

/// An error no categorization tier recognises.
pub fn local_bug() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "checksum mismatch in local buffer")
}

/// Run one request through the raw protocol, asserting it is admitted.
pub fn admit(breaker: &CircuitBreaker, err: Option<&(dyn Error + 'static)>) {
    assert!(!breaker.is_open(), "request unexpectedly refused");
    assert!(breaker.record_start(), "request unexpectedly not admitted");
    breaker.record_outcome(err);
}

/// Trip the scenario breaker with 3 refusals and 1 success.
pub fn trip(breaker: &CircuitBreaker) {
    let err = refused();
    for _ in 0..3 {
        admit(breaker, Some(&err));
    }
    admit(breaker, None);
    assert!(breaker.is_open());
}
