//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Transfer operation on a connector:
//!     → circuit_breaker.rs (is_open? record_start)
//!     → operation runs outside any lock
//!     → category.rs (classify the error, if any)
//!     → circuit_breaker.rs (record_outcome, evaluate transitions)
//!     → rolling.rs / bucket.rs (windowed request and failure counts)
//! ```
//!
//! # Design Decisions
//! - One breaker per connector, in-process only
//! - Failures count only when their category is configured
//! - Retry policy lives elsewhere and keeps its own state

pub mod bucket;
pub mod category;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod error;
pub mod lock;
pub mod rolling;
pub mod state;

pub use category::{Categorizer, FailureCategory, KindedError, TransportErrorKind};
pub use circuit_breaker::{BreakerStats, CircuitBreaker};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BreakerConfig, BreakerConfigError, BreakerParameters};
pub use error::{CallError, CircuitOpenError};
pub use state::CircuitState;
