//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! CircuitBreaker / Connector:
//!     → tracing events (transitions, rejections, trial admission)
//!     → metrics.rs (state gauge, transition/outcome/rejection counters)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
