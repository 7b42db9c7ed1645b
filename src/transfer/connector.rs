//! Breaker-guarded file-transfer connector.
//!
//! # Responsibilities
//! - Expose get/put/list/delete over an opaque [`Transport`]
//! - Route every operation through the connector's circuit breaker
//! - Hand transport errors back unchanged
//!
//! # Design Decisions
//! - The breaker is optional; `breaker.enabled = false` skips it entirely
//! - Blocking I/O happens in the transport, never under the breaker's lock

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::TransferConfig;
use crate::resilience::{BreakerConfigError, CircuitBreaker};
use crate::transfer::{ConnectorError, TransferError};

/// The wire-level operations a connector delegates to.
pub trait Transport: Send + Sync {
    fn get(&self, remote: &str) -> Result<Vec<u8>, TransferError>;
    fn put(&self, remote: &str, data: &[u8]) -> Result<(), TransferError>;
    fn list(&self, dir: &str) -> Result<Vec<String>, TransferError>;
    fn delete(&self, remote: &str) -> Result<(), TransferError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Get,
    Put,
    List,
    Delete,
}

impl FileOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileOperation::Get => "get",
            FileOperation::Put => "put",
            FileOperation::List => "list",
            FileOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct Connector<T> {
    name: String,
    transport: T,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl<T: Transport> Connector<T> {
    /// A connector without a breaker.
    pub fn new(name: impl Into<String>, transport: T) -> Self {
        Self {
            name: name.into(),
            transport,
            breaker: None,
        }
    }

    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Build a connector, and its breaker when enabled, from file config.
    pub fn from_config(config: &TransferConfig, transport: T) -> Result<Self, BreakerConfigError> {
        let connector = Self::new(config.connector.name.clone(), transport);
        if !config.breaker.enabled {
            return Ok(connector);
        }

        let breaker = CircuitBreaker::new(
            config.connector.name.clone(),
            config.breaker.to_breaker_config()?,
        )
        .with_categorizer(TransferError::categorizer());
        Ok(connector.with_breaker(Arc::new(breaker)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.breaker.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn get(&self, remote: &str) -> Result<Vec<u8>, ConnectorError> {
        self.guarded(FileOperation::Get, remote, |t| t.get(remote))
    }

    pub fn put(&self, remote: &str, data: &[u8]) -> Result<(), ConnectorError> {
        self.guarded(FileOperation::Put, remote, |t| t.put(remote, data))
    }

    pub fn list(&self, dir: &str) -> Result<Vec<String>, ConnectorError> {
        self.guarded(FileOperation::List, dir, |t| t.list(dir))
    }

    pub fn delete(&self, remote: &str) -> Result<(), ConnectorError> {
        self.guarded(FileOperation::Delete, remote, |t| t.delete(remote))
    }

    fn guarded<R>(
        &self,
        operation: FileOperation,
        path: &str,
        f: impl FnOnce(&T) -> Result<R, TransferError>,
    ) -> Result<R, ConnectorError> {
        let result = match &self.breaker {
            Some(breaker) => breaker.call(|| f(&self.transport)).map_err(ConnectorError::from),
            None => f(&self.transport).map_err(ConnectorError::from),
        };

        if let Err(e) = &result {
            debug!(
                connector = %self.name,
                operation = %operation,
                path = %path,
                error = %e,
                "Transfer operation failed"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{BreakerConfig, BreakerParameters, CircuitState, FailureCategory, ManualClock};
    use crate::transfer::{ScriptedTransport, Step};

    fn guarded(steps: Vec<Step>) -> (Connector<ScriptedTransport>, ManualClock) {
        let clock = ManualClock::new(0);
        let config = BreakerConfig::new(BreakerParameters {
            request_volume_threshold: 2,
            time_window_millis: 10_000,
            bucket_size_millis: 1_000,
            failure_threshold: 0.5,
            reset_time_millis: 5_000,
            failure_categories: vec![FailureCategory::ConnectionError],
        })
        .unwrap();
        let breaker = CircuitBreaker::with_clock("ftp", config, Arc::new(clock.clone()))
            .with_categorizer(TransferError::categorizer());
        let connector = Connector::new("ftp", ScriptedTransport::new("ftp.test", steps))
            .with_breaker(Arc::new(breaker));
        (connector, clock)
    }

    #[test]
    fn test_operations_pass_through_when_healthy() {
        let (connector, _) = guarded(vec![]);
        assert_eq!(connector.get("/a.txt").unwrap(), b"contents of /a.txt");
        connector.put("/b.txt", b"data").unwrap();
        assert_eq!(connector.list("/in").unwrap().len(), 2);
        connector.delete("/a.txt").unwrap();
        assert_eq!(connector.transport().calls(), 4);
    }

    #[test]
    fn test_open_circuit_skips_transport() {
        let (connector, clock) = guarded(vec![Step::Refused, Step::Refused]);
        assert!(matches!(connector.get("/a"), Err(ConnectorError::Transfer(_))));
        assert!(matches!(connector.get("/a"), Err(ConnectorError::Transfer(_))));

        let err = connector.list("/in").unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(err.to_string(), "Circuit breaker for 'ftp' is open. Retry in 5.0 seconds.");
        assert_eq!(connector.transport().calls(), 2);

        clock.advance(5_000);
        assert_eq!(connector.list("/in").unwrap().len(), 2);
        let breaker = connector.breaker().unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_uncounted_errors_are_returned_unchanged() {
        let (connector, _) = guarded(vec![Step::AuthFailure, Step::AuthFailure, Step::AuthFailure]);
        for _ in 0..3 {
            match connector.get("/a") {
                Err(ConnectorError::Transfer(TransferError::Reply { code, .. })) => assert_eq!(code, 530),
                other => panic!("unexpected result: {other:?}"),
            }
        }
        assert!(!connector.breaker().unwrap().is_open());
    }

    #[test]
    fn test_from_config_recognises_transfer_kinds() {
        let mut config = TransferConfig::default();
        config.breaker.request_volume_threshold = 2;
        let transport = ScriptedTransport::new("ftp.test", vec![Step::Unavailable; 2]);
        let connector = Connector::from_config(&config, transport).unwrap();

        for _ in 0..2 {
            assert!(matches!(
                connector.get("/a"),
                Err(ConnectorError::Transfer(TransferError::Unavailable(_)))
            ));
        }
        assert!(connector.get("/a").unwrap_err().is_circuit_open());
        assert_eq!(connector.transport().calls(), 2);
    }

    #[test]
    fn test_without_breaker() {
        let connector = Connector::new("plain", ScriptedTransport::new("h", vec![Step::Refused; 5]));
        for _ in 0..5 {
            assert!(matches!(connector.get("/a"), Err(ConnectorError::Transfer(_))));
        }
        assert!(connector.breaker().is_none());
        assert_eq!(connector.transport().calls(), 5);
    }
}
