//! Failure classification.
//!
//! # Responsibilities
//! - Label an error (and everything in its `source()` chain) with a
//!   [`FailureCategory`], or leave it uncategorized
//! - Decide nothing about counting; that is the breaker's `should_count`
//!
//! # Tiers
//! ```text
//! 1. structured kind   KindedError::kind() via downcast_ref
//! 2. typed matching    std::io::Error kinds, plus per-level message rules
//! 3. message rules     FTP reply codes and phrases over the joined chain
//! ```
//! Each tier scans the whole chain before the next tier runs.
//!
//! # Design Decisions
//! - Categories are labels only; the original error is never replaced
//! - Unknown errors stay uncategorized so local bugs do not trip the breaker

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::io;
use std::str::FromStr;


/// Classification label for an observed error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCategory {
    ConnectionError,
    AuthenticationError,
    TransientError,
    /// Sentinel for configuration: every error counts. Never produced by
    /// categorization.
    AllErrors,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::ConnectionError => "CONNECTION_ERROR",
            FailureCategory::AuthenticationError => "AUTHENTICATION_ERROR",
            FailureCategory::TransientError => "TRANSIENT_ERROR",
            FailureCategory::AllErrors => "ALL_ERRORS",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown failure category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for FailureCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "CONNECTION_ERROR" => Ok(FailureCategory::ConnectionError),
            "AUTHENTICATION_ERROR" => Ok(FailureCategory::AuthenticationError),
            "TRANSIENT_ERROR" => Ok(FailureCategory::TransientError),
            "ALL_ERRORS" => Ok(FailureCategory::AllErrors),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

/// Machine-readable error kind reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Connection,
    ServiceUnavailable,
    Protocol,
    NotFound,
    Io,
}

/// Capability for errors that know their transport kind.
pub trait KindedError: Error + 'static {
    fn kind(&self) -> TransportErrorKind;
}

type KindLookup = fn(&(dyn Error + 'static)) -> Option<TransportErrorKind>;

fn kind_of<E: KindedError>(err: &(dyn Error + 'static)) -> Option<TransportErrorKind> {
    err.downcast_ref::<E>().map(KindedError::kind)
}

// Guards against pathological self-referencing chains.
const MAX_CHAIN_DEPTH: usize = 32;

const TRANSIENT_REPLY_CODES: [u16; 6] = [421, 425, 426, 450, 451, 452];
const AUTH_REPLY_CODE: u16 = 530;

static REPLY_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([1-5][0-9]{2})\b").expect("reply code pattern is valid"));

const CONNECTION_PHRASES: &[&str] = &[
    "connection refused",
    "connection timed out",
    "connect timed out",
    "timed out",
    "unknown host",
    "no route to host",
    "network is unreachable",
    "host unreachable",
    "could not connect",
    "couldn't connect",
    "failed to connect",
    "unable to connect",
    "failed to lookup address",
    "name or service not known",
];

const AUTH_PHRASES: &[&str] = &[
    "authentication failed",
    "auth fail",
    "login incorrect",
    "login failed",
    "invalid credentials",
    "not logged in",
    "permission denied (publickey",
    "access denied",
];

const TRANSIENT_PHRASES: &[&str] = &[
    "connection reset",
    "reset by peer",
    "connection closed",
    "closed by remote",
    "socket closed",
    "broken pipe",
];

/// Maps errors to failure categories.
///
/// Starts with no kinded types; transports register theirs with
/// [`with_kinded`](Self::with_kinded).
#[derive(Clone, Default)]
pub struct Categorizer {
    lookups: Vec<KindLookup>,
}

impl fmt::Debug for Categorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Categorizer")
            .field("kinded_types", &self.lookups.len())
            .finish()
    }
}

impl Categorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register another error type whose kind tier 1 should consult.
    pub fn with_kinded<E: KindedError>(mut self) -> Self {
        self.lookups.push(kind_of::<E>);
        self
    }

    /// Categorize `err` by walking its cause chain; `None` if nothing matches.
    pub fn categorize(&self, err: &(dyn Error + 'static)) -> Option<FailureCategory> {
        let chain = error_chain(err);

        chain
            .iter()
            .find_map(|e| self.structured(*e))
            .or_else(|| chain.iter().find_map(|e| typed(*e)))
            .or_else(|| {
                let joined = chain
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join(": ");
                classify_message(&joined)
            })
    }

    fn structured(&self, err: &(dyn Error + 'static)) -> Option<FailureCategory> {
        let kind = self.lookups.iter().find_map(|lookup| lookup(err))?;
        match kind {
            TransportErrorKind::Connection => Some(FailureCategory::ConnectionError),
            TransportErrorKind::ServiceUnavailable => Some(FailureCategory::TransientError),
            _ => None,
        }
    }
}

/// The error followed by its causes. `io::Error` hides a custom payload
/// from `source()`, so the payload is visited explicitly.
fn error_chain<'a>(err: &'a (dyn Error + 'static)) -> Vec<&'a (dyn Error + 'static)> {
    let mut chain = Vec::new();
    let mut next = Some(err);
    while let Some(e) = next {
        if chain.len() == MAX_CHAIN_DEPTH {
            break;
        }
        chain.push(e);
        next = match e.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
            Some(inner) => Some(inner as &(dyn Error + 'static)),
            None => e.source(),
        };
    }
    chain
}

fn typed(err: &(dyn Error + 'static)) -> Option<FailureCategory> {
    if let Some(io_err) = err.downcast_ref::<io::Error>() {
        if let Some(category) = io_kind(io_err) {
            return Some(category);
        }
    }
    classify_message(&err.to_string())
}

fn io_kind(err: &io::Error) -> Option<FailureCategory> {
    use io::ErrorKind::*;

    match err.kind() {
        ConnectionRefused | TimedOut | HostUnreachable | NetworkUnreachable | AddrNotAvailable => {
            Some(FailureCategory::ConnectionError)
        }
        UnexpectedEof | ConnectionReset | BrokenPipe => Some(FailureCategory::TransientError),
        ConnectionAborted | NotConnected => {
            let message = err.to_string().to_lowercase();
            if message.contains("reset") || message.contains("broken pipe") {
                Some(FailureCategory::TransientError)
            } else {
                Some(FailureCategory::ConnectionError)
            }
        }
        _ => None,
    }
}

/// Case-insensitive message heuristics.
pub fn classify_message(message: &str) -> Option<FailureCategory> {
    let lower = message.to_lowercase();

    for caps in REPLY_CODE.captures_iter(&lower) {
        let Ok(code) = caps[1].parse::<u16>() else {
            continue;
        };
        if TRANSIENT_REPLY_CODES.contains(&code) {
            return Some(FailureCategory::TransientError);
        }
        if code == AUTH_REPLY_CODE {
            return Some(FailureCategory::AuthenticationError);
        }
    }

    // transient phrases first: "connection reset" must not read as a
    // connection failure
    if TRANSIENT_PHRASES.iter().any(|p| lower.contains(p)) {
        return Some(FailureCategory::TransientError);
    }
    if CONNECTION_PHRASES.iter().any(|p| lower.contains(p)) {
        return Some(FailureCategory::ConnectionError);
    }
    if AUTH_PHRASES.iter().any(|p| lower.contains(p)) {
        return Some(FailureCategory::AuthenticationError);
    }
    None
}
