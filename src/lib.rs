//! Client-side circuit breaker for FTP/SFTP transfer connectors.

pub mod config;
pub mod observability;
pub mod resilience;
pub mod transfer;

pub use config::schema::TransferConfig;
pub use resilience::{CircuitBreaker, CircuitOpenError, CircuitState};
pub use transfer::{Connector, ConnectorError, TransferError, Transport};
