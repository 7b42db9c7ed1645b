//! Circuit breaker for transfer connectors.
//!
//! # States
//! - Closed: normal operation, requests pass through and are counted
//! - Open: server assumed down, requests fail fast
//! - Half-Open: one trial request checks whether the server recovered
//!
//! # Protocol
//! ```text
//! is_open()        → true: surface CircuitOpenError, do not run the operation
//! record_start()   → count the request (or admit the half-open trial)
//! <operation>
//! record_outcome() → exactly once per admitted start
//! ```
//!
//! # Design Decisions
//! - One breaker per connector, shared across threads via `Arc`
//! - All mutable state sits behind one `StampedLock`; `is_open` and `state`
//!   try a lock-free optimistic read first
//! - Transitions are evaluated on demand inside `is_open`, `record_start`
//!   and `record_outcome`; `state` never transitions
//! - No I/O under the lock: log events and metrics for transitions are
//!   emitted after it is released
//! - Single trial in Half-Open (prevents hammering a recovering server)

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::observability::metrics;
use crate::resilience::category::{Categorizer, FailureCategory};
use crate::resilience::clock::{Clock, SystemClock};
use crate::resilience::config::BreakerConfig;
use crate::resilience::error::{CallError, CircuitOpenError, OperationPanicked};
use crate::resilience::lock::{Snapshot, StampedLock};
use crate::resilience::rolling::RollingHealth;
use crate::resilience::state::CircuitState;

const TRIAL_BIT: u8 = 0b100;
const STATE_MASK: u8 = 0b011;

#[derive(Debug)]
struct BreakerCore {
    state: CircuitState,
    trial_in_progress: bool,
    health: RollingHealth,
}

impl Snapshot for BreakerCore {
    fn snapshot(&self) -> u8 {
        let trial = if self.trial_in_progress { TRIAL_BIT } else { 0 };
        self.state.as_u8() | trial
    }
}

fn decode(view: u8) -> (CircuitState, bool) {
    (CircuitState::from_u8(view & STATE_MASK), view & TRIAL_BIT != 0)
}

/// A state change captured under the lock and reported after it.
#[derive(Debug, Clone, Copy)]
struct Transition {
    from: CircuitState,
    to: CircuitState,
    total: u64,
    failures: u64,
    ratio: f64,
}

impl BreakerCore {
    fn transition(&mut self, to: CircuitState) -> Transition {
        let from = self.state;
        self.state = to;
        Transition {
            from,
            to,
            total: self.health.total_count(),
            failures: self.health.failure_count(),
            ratio: self.health.failure_ratio(),
        }
    }

    fn blocks_callers(&self) -> bool {
        match self.state {
            CircuitState::Closed => false,
            CircuitState::Open => true,
            CircuitState::HalfOpen => self.trial_in_progress,
        }
    }
}

/// Point-in-time view of a breaker, for status output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerStats {
    pub connector: String,
    pub state: CircuitState,
    pub trial_in_progress: bool,
    pub total_count: u64,
    pub failure_count: u64,
    pub failure_ratio: f64,
    pub last_error_time: Option<u64>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    categorizer: Categorizer,
    clock: Arc<dyn Clock>,
    core: StampedLock<BreakerCore>,
}

impl CircuitBreaker {
    /// Create a breaker on the system clock.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    pub fn with_clock(name: impl Into<String>, config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let health = RollingHealth::new(&config, clock.now_millis());
        let name = name.into();
        metrics::record_state(&name, CircuitState::Closed);

        Self {
            name,
            config,
            categorizer: Categorizer::default(),
            clock,
            core: StampedLock::new(BreakerCore {
                state: CircuitState::Closed,
                trial_in_progress: false,
                health,
            }),
        }
    }

    /// Replace the categorizer, e.g. to register transport error types.
    pub fn with_categorizer(mut self, categorizer: Categorizer) -> Self {
        self.categorizer = categorizer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Whether callers must currently be refused.
    ///
    /// Closed answers from the optimistic read; Open (or a contended read)
    /// takes the write lock so the reset timeout can move the circuit to
    /// Half-Open.
    pub fn is_open(&self) -> bool {
        if let Some(view) = self.core.optimistic() {
            match decode(view) {
                (CircuitState::Closed, _) => return false,
                (CircuitState::HalfOpen, trial) => return trial,
                (CircuitState::Open, _) => {}
            }
        }

        let now = self.clock.now_millis();
        let mut transitions = Vec::new();
        let open = self.core.write(|core| {
            self.evaluate(core, now, &mut transitions);
            core.blocks_callers()
        });
        self.emit(&transitions);
        open
    }

    /// Register the start of an operation.
    ///
    /// Returns `false` without recording anything when the circuit is open
    /// or another caller already holds the half-open trial; such a caller
    /// must not run the operation and must not report an outcome.
    pub fn record_start(&self) -> bool {
        let now = self.clock.now_millis();
        let mut transitions = Vec::new();
        let (admitted, trial) = self.core.write(|core| {
            self.evaluate(core, now, &mut transitions);
            match core.state {
                CircuitState::Open => (false, false),
                CircuitState::HalfOpen if core.trial_in_progress => (false, false),
                CircuitState::HalfOpen => {
                    core.trial_in_progress = true;
                    (true, true)
                }
                CircuitState::Closed => {
                    core.health.prepare_window(now);
                    core.health.record_request(now);
                    (true, false)
                }
            }
        });
        self.emit(&transitions);

        if trial {
            debug!(connector = %self.name, "Admitted half-open trial request");
        }
        admitted
    }

    /// Report how the operation admitted by `record_start` ended.
    ///
    /// `None` is a success. Errors that do not count (see
    /// [`should_count`](Self::should_count)) are treated as successes.
    pub fn record_outcome(&self, err: Option<&(dyn Error + 'static)>) {
        // categorization is pure, keep it outside the critical section
        let countable = err.is_some_and(|e| self.should_count(e));
        let now = self.clock.now_millis();
        let mut transitions = Vec::new();

        self.core.write(|core| {
            // the operation may have outlived the bucket its request went to
            core.health.prepare_window(now);

            if core.state == CircuitState::HalfOpen {
                core.trial_in_progress = false;
                if countable {
                    core.health.record_failure(now);
                    transitions.push(core.transition(CircuitState::Open));
                } else {
                    core.health.record_success();
                    core.health.reset_all();
                    transitions.push(core.transition(CircuitState::Closed));
                }
                return;
            }

            if countable {
                core.health.record_failure(now);
            } else {
                core.health.record_success();
            }
            if core.state == CircuitState::Closed {
                self.check_trip(core, now, &mut transitions);
            }
        });

        let result = match (err, countable) {
            (None, _) => "success",
            (Some(_), true) => "failure",
            (Some(_), false) => "ignored",
        };
        metrics::record_outcome(&self.name, result);
        if let (Some(e), false) = (err, countable) {
            debug!(connector = %self.name, error = %e, "Error not counted toward tripping");
        }
        self.emit(&transitions);
    }

    /// Current state without evaluating any transition.
    pub fn state(&self) -> CircuitState {
        match self.core.optimistic() {
            Some(view) => decode(view).0,
            None => self.core.read(|core| core.state),
        }
    }

    /// Whether `err` counts toward tripping under this breaker's categories.
    pub fn should_count(&self, err: &(dyn Error + 'static)) -> bool {
        if self.config.counts_all_errors() {
            return true;
        }
        self.categorizer
            .categorize(err)
            .is_some_and(|category| self.config.failure_categories().contains(&category))
    }

    pub fn categorize(&self, err: &(dyn Error + 'static)) -> Option<FailureCategory> {
        self.categorizer.categorize(err)
    }

    /// The open-circuit error, stating how long until a trial is allowed.
    pub fn service_unavailable_error(&self) -> CircuitOpenError {
        let now = self.clock.now_millis();
        let last_error = self.core.read(|core| core.health.last_error_time());
        let remaining = match last_error {
            Some(at) => self
                .config
                .reset_time_millis()
                .saturating_sub(now.saturating_sub(at)),
            None => 0,
        };

        CircuitOpenError {
            connector: self.name.clone(),
            remaining: Duration::from_millis(remaining),
        }
    }

    /// Window statistics after dropping stale buckets. Never transitions.
    pub fn stats(&self) -> BreakerStats {
        let now = self.clock.now_millis();
        self.core.write(|core| {
            core.health.prepare_window(now);
            BreakerStats {
                connector: self.name.clone(),
                state: core.state,
                trial_in_progress: core.trial_in_progress,
                total_count: core.health.total_count(),
                failure_count: core.health.failure_count(),
                failure_ratio: core.health.failure_ratio(),
                last_error_time: core.health.last_error_time(),
            }
        })
    }

    /// Run `operation` under the breaker's protocol.
    ///
    /// Refuses with [`CallError::Open`] without running it while the
    /// circuit is open; otherwise reports exactly one outcome, including
    /// when the operation panics.
    pub fn call<T, E, F>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: Error + 'static,
    {
        if self.is_open() || !self.record_start() {
            metrics::record_rejected(&self.name);
            let err = self.service_unavailable_error();
            debug!(
                connector = %self.name,
                remaining_ms = err.remaining.as_millis() as u64,
                "Call rejected, circuit open"
            );
            return Err(CallError::Open(err));
        }

        let guard = OutcomeGuard { breaker: self, armed: true };
        let result = operation();
        guard.complete(result.as_ref().err().map(|e| e as &(dyn Error + 'static)));

        result.map_err(CallError::Operation)
    }

    fn evaluate(&self, core: &mut BreakerCore, now: u64, out: &mut Vec<Transition>) {
        if core.state == CircuitState::Closed {
            self.check_trip(core, now, out);
        }
        if core.state == CircuitState::Open && self.reset_elapsed(core, now) {
            core.trial_in_progress = false;
            out.push(core.transition(CircuitState::HalfOpen));
        }
    }

    fn check_trip(&self, core: &mut BreakerCore, now: u64, out: &mut Vec<Transition>) {
        core.health.prepare_window(now);
        let total = core.health.total_count();
        if total >= self.config.request_volume_threshold()
            && core.health.failure_ratio() > self.config.failure_threshold()
        {
            out.push(core.transition(CircuitState::Open));
        }
    }

    fn reset_elapsed(&self, core: &BreakerCore, now: u64) -> bool {
        match core.health.last_error_time() {
            Some(at) => now.saturating_sub(at) >= self.config.reset_time_millis(),
            None => true,
        }
    }

    fn emit(&self, transitions: &[Transition]) {
        for t in transitions {
            match (t.from, t.to) {
                (CircuitState::Closed, CircuitState::Open) => warn!(
                    connector = %self.name,
                    total = t.total,
                    failures = t.failures,
                    ratio = t.ratio,
                    threshold = self.config.failure_threshold(),
                    "Circuit transitioning from Closed to Open"
                ),
                (CircuitState::HalfOpen, CircuitState::Open) => warn!(
                    connector = %self.name,
                    reset_ms = self.config.reset_time_millis(),
                    "Half-open trial failed, circuit reopened"
                ),
                (from, to) => info!(
                    connector = %self.name,
                    from = %from,
                    to = %to,
                    "Circuit state changed"
                ),
            }
            metrics::record_transition(&self.name, t.to);
        }
    }
}

/// Reports an outcome if the operation unwinds before `complete`.
struct OutcomeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl OutcomeGuard<'_> {
    fn complete(mut self, err: Option<&(dyn Error + 'static)>) {
        self.armed = false;
        self.breaker.record_outcome(err);
    }
}

impl Drop for OutcomeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.record_outcome(Some(&OperationPanicked));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;
    use crate::resilience::config::BreakerParameters;
    use std::io;

    const START: u64 = 1_700_000_000_000;

    fn breaker(categories: Vec<FailureCategory>) -> (CircuitBreaker, ManualClock) {
        let clock = ManualClock::new(START);
        let config = BreakerConfig::new(BreakerParameters {
            request_volume_threshold: 4,
            time_window_millis: 10_000,
            bucket_size_millis: 5_000,
            failure_threshold: 0.5,
            reset_time_millis: 2_000,
            failure_categories: categories,
        })
        .unwrap();
        let cb = CircuitBreaker::with_clock("test", config, Arc::new(clock.clone()));
        (cb, clock)
    }

    fn refused() -> io::Error {
        io::Error::from(io::ErrorKind::ConnectionRefused)
    }

    fn run(cb: &CircuitBreaker, err: Option<io::Error>) {
        assert!(!cb.is_open());
        assert!(cb.record_start());
        cb.record_outcome(err.as_ref().map(|e| e as &(dyn Error + 'static)));
    }

    #[test]
    fn test_starts_closed() {
        let (cb, _) = breaker(vec![FailureCategory::ConnectionError]);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(!cb.is_open());
        assert_eq!(cb.stats().total_count, 0);
    }

    #[test]
    fn test_trips_after_volume_and_ratio() {
        let (cb, _) = breaker(vec![FailureCategory::ConnectionError]);
        run(&cb, Some(refused()));
        run(&cb, Some(refused()));
        run(&cb, Some(refused()));
        assert_eq!(cb.state(), CircuitState::Closed);

        run(&cb, None);
        assert!(cb.is_open());
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_ratio_at_threshold_stays_closed() {
        let (cb, _) = breaker(vec![FailureCategory::ConnectionError]);
        run(&cb, Some(refused()));
        run(&cb, Some(refused()));
        run(&cb, None);
        run(&cb, None);
        assert!(!cb.is_open());
        assert_eq!(cb.stats().failure_ratio, 0.5);
    }

    #[test]
    fn test_uncounted_category_is_a_success() {
        let (cb, _) = breaker(vec![FailureCategory::AuthenticationError]);
        for _ in 0..4 {
            run(&cb, Some(refused()));
        }
        assert!(!cb.is_open());
        assert_eq!(cb.stats().failure_count, 0);
    }

    #[test]
    fn test_open_rejects_until_reset_time() {
        let (cb, clock) = breaker(vec![FailureCategory::ConnectionError]);
        for _ in 0..4 {
            run(&cb, Some(refused()));
        }
        assert!(cb.is_open());
        assert!(!cb.record_start());

        clock.advance(1_999);
        assert!(cb.is_open());
        let err = cb.service_unavailable_error();
        assert_eq!(err.remaining, Duration::from_millis(1));

        clock.advance(1);
        // state() is pure observation
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.is_open());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_trial_success_closes_and_clears_window() {
        let (cb, clock) = breaker(vec![FailureCategory::ConnectionError]);
        for _ in 0..4 {
            run(&cb, Some(refused()));
        }
        clock.advance(2_000);

        assert!(!cb.is_open());
        assert!(cb.record_start());
        assert!(cb.is_open(), "other callers are blocked while the trial runs");
        assert!(!cb.record_start());

        cb.record_outcome(None);
        assert_eq!(cb.state(), CircuitState::Closed);
        let stats = cb.stats();
        assert_eq!(stats.total_count, 0);
        assert_eq!(stats.failure_ratio, 0.0);
        assert!(!stats.trial_in_progress);
    }

    #[test]
    fn test_trial_failure_reopens_and_restarts_countdown() {
        let (cb, clock) = breaker(vec![FailureCategory::ConnectionError]);
        for _ in 0..4 {
            run(&cb, Some(refused()));
        }
        clock.advance(2_500);
        assert!(!cb.is_open());
        assert!(cb.record_start());
        cb.record_outcome(Some(&refused()));

        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.stats().last_error_time, Some(START + 2_500));

        clock.advance(1_999);
        assert!(cb.is_open());
        clock.advance(1);
        assert!(!cb.is_open());
    }

    #[test]
    fn test_trial_uncountable_failure_closes() {
        let (cb, clock) = breaker(vec![FailureCategory::ConnectionError]);
        for _ in 0..4 {
            run(&cb, Some(refused()));
        }
        clock.advance(2_000);
        assert!(!cb.is_open());
        assert!(cb.record_start());
        cb.record_outcome(Some(&io::Error::new(io::ErrorKind::Other, "disk full")));
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_all_errors_counts_uncategorized() {
        let (cb, _) = breaker(vec![FailureCategory::AllErrors]);
        let odd = || Some(io::Error::new(io::ErrorKind::Other, "checksum mismatch"));
        for _ in 0..4 {
            run(&cb, odd());
        }
        assert!(cb.is_open());
    }

    #[test]
    fn test_call_rejects_while_open() {
        let (cb, _) = breaker(vec![FailureCategory::ConnectionError]);
        for _ in 0..4 {
            let res: Result<(), _> = cb.call(|| Err(refused()));
            assert!(matches!(res, Err(CallError::Operation(_))));
        }

        let mut ran = false;
        let res: Result<(), CallError<io::Error>> = cb.call(|| {
            ran = true;
            Ok(())
        });
        assert!(!ran);
        let err = res.unwrap_err();
        assert!(err.is_open());
        assert!(err.to_string().contains("Retry in 2.0 seconds"));
    }

    #[test]
    fn test_call_reports_outcome_when_operation_panics() {
        let (cb, clock) = breaker(vec![FailureCategory::ConnectionError]);
        for _ in 0..4 {
            run(&cb, Some(refused()));
        }
        clock.advance(2_000);

        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), CallError<io::Error>> = cb.call(|| panic!("transport bug"));
        }));
        assert!(panicked.is_err());

        // the trial was released; a panic is uncategorized, so it closed
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(!cb.is_open());
    }

    #[test]
    fn test_idle_window_expires() {
        let (cb, clock) = breaker(vec![FailureCategory::ConnectionError]);
        run(&cb, Some(refused()));
        run(&cb, None);
        assert_eq!(cb.stats().total_count, 2);

        clock.advance(10_001);
        assert_eq!(cb.stats().total_count, 0);
    }
}
