//! File-transfer connectors.
//!
//! # Data Flow
//! ```text
//! Connector::get/put/list/delete
//!     → CircuitBreaker::call (refuse fast while open)
//!     → Transport (FTP/SFTP wire protocol, or a scripted stand-in)
//!     → TransferError returned to the caller unchanged
//! ```

pub mod connector;
pub mod error;
pub mod scripted;

pub use connector::{Connector, FileOperation, Transport};
pub use error::{ConnectorError, TransferError};
pub use scripted::{parse_script, random_script, InvalidStep, ScriptedTransport, Step};
