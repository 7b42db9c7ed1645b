//! Errors originated by the breaker itself.

use std::time::Duration;

/// Returned instead of running an operation while the circuit is open.
///
/// This is the only error the breaker creates; failures of the wrapped
/// operation are passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Circuit breaker for '{connector}' is open. Retry in {:.1} seconds.", .remaining.as_secs_f64())]
pub struct CircuitOpenError {
    pub connector: String,
    pub remaining: Duration,
}

/// Outcome of [`CircuitBreaker::call`](super::CircuitBreaker::call).
#[derive(Debug, thiserror::Error)]
pub enum CallError<E> {
    #[error(transparent)]
    Open(#[from] CircuitOpenError),

    #[error(transparent)]
    Operation(E),
}

impl<E> CallError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, CallError::Open(_))
    }

    /// The operation's own error, if it ran and failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            CallError::Operation(e) => Some(e),
            CallError::Open(_) => None,
        }
    }
}

/// Recorded as the outcome when a wrapped operation panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation panicked before reporting an outcome")]
pub struct OperationPanicked;
