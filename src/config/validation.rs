//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Apply the breaker's construction rules to the file values
//! - Validate connector identity and the metrics address
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TransferConfig → Result<(), Vec<ValidationError>>
//! - Breaker rules are skipped when the breaker is disabled

use std::net::SocketAddr;

use crate::config::schema::TransferConfig;
use crate::resilience::BreakerConfigError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("connector.name must not be empty")]
    EmptyConnectorName,

    #[error("breaker: {0}")]
    Breaker(#[from] BreakerConfigError),

    #[error("observability.metrics_address '{0}' is not a valid socket address")]
    InvalidMetricsAddress(String),
}

pub fn validate_config(config: &TransferConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.connector.name.trim().is_empty() {
        errors.push(ValidationError::EmptyConnectorName);
    }

    if config.breaker.enabled {
        errors.extend(
            config
                .breaker
                .to_parameters()
                .validate()
                .into_iter()
                .map(ValidationError::from),
        );
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
