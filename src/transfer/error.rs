//! Transport and connector errors.

use std::io;

use crate::resilience::{CallError, Categorizer, CircuitOpenError, KindedError, TransportErrorKind};

/// Failure reported by a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("could not connect to {host}")]
    Connect {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("server replied {code} {message}")]
    Reply { code: u16, message: String },

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("remote path not found: {0}")]
    NotFound(String),

    #[error("transfer I/O error")]
    Io(#[from] io::Error),
}

impl TransferError {
    /// Categorizer that reads transfer error kinds before falling back to
    /// io kinds and message rules.
    pub fn categorizer() -> Categorizer {
        Categorizer::new().with_kinded::<TransferError>()
    }
}

impl KindedError for TransferError {
    fn kind(&self) -> TransportErrorKind {
        match self {
            TransferError::Connect { .. } => TransportErrorKind::Connection,
            TransferError::Unavailable(_) => TransportErrorKind::ServiceUnavailable,
            TransferError::Reply { .. } => TransportErrorKind::Protocol,
            TransferError::NotFound(_) => TransportErrorKind::NotFound,
            TransferError::Io(_) => TransportErrorKind::Io,
        }
    }
}

/// Result of a connector operation.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Open(#[from] CircuitOpenError),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl From<CallError<TransferError>> for ConnectorError {
    fn from(err: CallError<TransferError>) -> Self {
        match err {
            CallError::Open(e) => ConnectorError::Open(e),
            CallError::Operation(e) => ConnectorError::Transfer(e),
        }
    }
}

impl ConnectorError {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ConnectorError::Open(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::FailureCategory;

    #[test]
    fn test_error_display() {
        let err = TransferError::Reply {
            code: 550,
            message: "No such file".into(),
        };
        assert_eq!(err.to_string(), "server replied 550 No such file");

        let err = TransferError::Connect {
            host: "ftp.example.com:21".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(err.to_string(), "could not connect to ftp.example.com:21");
    }

    #[test]
    fn test_kinds_drive_categorization() {
        let categorizer = TransferError::categorizer();

        let err = TransferError::NotFound("/outbox/a.csv".into());
        assert_eq!(err.kind(), TransportErrorKind::NotFound);
        assert_eq!(categorizer.categorize(&err), None);

        let err = TransferError::Io(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert_eq!(categorizer.categorize(&err), Some(FailureCategory::TransientError));

        let err = TransferError::Reply {
            code: 530,
            message: "Login incorrect.".into(),
        };
        assert_eq!(
            categorizer.categorize(&err),
            Some(FailureCategory::AuthenticationError)
        );
    }

    #[test]
    fn test_structured_kind_needs_registration() {
        let err = TransferError::Unavailable("maintenance window".into());
        assert_eq!(Categorizer::new().categorize(&err), None);
        assert_eq!(
            TransferError::categorizer().categorize(&err),
            Some(FailureCategory::TransientError)
        );

        let err = TransferError::Connect {
            host: "ftp.example.com".into(),
            source: io::Error::new(io::ErrorKind::Other, "530 login incorrect"),
        };
        // the connect kind wins over the reply code in its cause
        assert_eq!(
            TransferError::categorizer().categorize(&err),
            Some(FailureCategory::ConnectionError)
        );
    }
}
