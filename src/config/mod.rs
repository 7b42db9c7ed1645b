//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → TransferConfig (validated, immutable)
//!     → BreakerSettings::to_breaker_config → CircuitBreaker
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a breaker never changes settings
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{BreakerSettings, ConnectorSettings, ObservabilityConfig, TransferConfig};
pub use validation::{validate_config, ValidationError};
