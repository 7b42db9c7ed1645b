//! Scripted transport for simulations and tests.
//!
//! Each operation consumes the next [`Step`]; once the script runs out every
//! operation succeeds.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::transfer::{TransferError, Transport};

/// Outcome of one scripted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Ok,
    Refused,
    Timeout,
    Reset,
    Reply(u16),
    AuthFailure,
    Unavailable,
    /// An error no categorization tier recognises.
    Unknown,
}

const FAILURES: [Step; 7] = [
    Step::Refused,
    Step::Timeout,
    Step::Reset,
    Step::Reply(421),
    Step::AuthFailure,
    Step::Unavailable,
    Step::Unknown,
];

impl Step {
    pub fn is_failure(&self) -> bool {
        !matches!(self, Step::Ok)
    }

    fn into_result(self, host: &str) -> Result<(), TransferError> {
        match self {
            Step::Ok => Ok(()),
            Step::Refused => Err(TransferError::Connect {
                host: host.to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }),
            Step::Timeout => Err(io::Error::new(io::ErrorKind::TimedOut, "data channel timed out").into()),
            Step::Reset => Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer").into()),
            Step::Reply(code) => Err(TransferError::Reply {
                code,
                message: reply_text(code).to_string(),
            }),
            Step::AuthFailure => Err(TransferError::Reply {
                code: 530,
                message: reply_text(530).to_string(),
            }),
            Step::Unavailable => Err(TransferError::Unavailable("server overloaded".into())),
            Step::Unknown => Err(io::Error::new(io::ErrorKind::InvalidData, "unexpected listing format").into()),
        }
    }
}

fn reply_text(code: u16) -> &'static str {
    match code {
        421 => "Service not available, closing control connection.",
        425 => "Can't open data connection.",
        426 => "Transfer aborted.",
        450 => "File unavailable.",
        451 => "Local error in processing.",
        452 => "Insufficient storage space.",
        530 => "Login incorrect.",
        550 => "No such file or directory.",
        _ => "Requested action not taken.",
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Ok => f.write_str("ok"),
            Step::Refused => f.write_str("refused"),
            Step::Timeout => f.write_str("timeout"),
            Step::Reset => f.write_str("reset"),
            Step::Reply(code) => write!(f, "{code}"),
            Step::AuthFailure => f.write_str("auth"),
            Step::Unavailable => f.write_str("unavailable"),
            Step::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid script step '{0}'")]
pub struct InvalidStep(pub String);

impl FromStr for Step {
    type Err = InvalidStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let step = s.trim().to_ascii_lowercase();
        match step.as_str() {
            "ok" | "success" => Ok(Step::Ok),
            "refused" => Ok(Step::Refused),
            "timeout" => Ok(Step::Timeout),
            "reset" => Ok(Step::Reset),
            "auth" => Ok(Step::AuthFailure),
            "unavailable" => Ok(Step::Unavailable),
            "unknown" => Ok(Step::Unknown),
            code if code.len() == 3 => code
                .parse::<u16>()
                .ok()
                .filter(|c| (100..600).contains(c))
                .map(Step::Reply)
                .ok_or_else(|| InvalidStep(s.to_string())),
            _ => Err(InvalidStep(s.to_string())),
        }
    }
}

/// Parse a comma separated script such as `ok,refused,421`.
pub fn parse_script(script: &str) -> Result<Vec<Step>, InvalidStep> {
    script
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Seeded random script; each step fails with probability `failure_rate`.
pub fn random_script(len: usize, failure_rate: f64, seed: u64) -> Vec<Step> {
    let mut rng = StdRng::seed_from_u64(seed);
    let failure_rate = failure_rate.clamp(0.0, 1.0);

    (0..len)
        .map(|_| {
            if rng.gen_bool(failure_rate) {
                FAILURES[rng.gen_range(0..FAILURES.len())]
            } else {
                Step::Ok
            }
        })
        .collect()
}

/// Transport that replays a script instead of talking to a server.
#[derive(Debug)]
pub struct ScriptedTransport {
    host: String,
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new(host: impl Into<String>, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            host: host.into(),
            steps: Mutex::new(steps.into_iter().collect()),
            calls: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    /// Sleep this long inside every operation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Operations that actually reached the transport.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.steps.lock().len()
    }

    fn next(&self) -> Result<(), TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().pop_front().unwrap_or(Step::Ok);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        step.into_result(&self.host)
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, remote: &str) -> Result<Vec<u8>, TransferError> {
        self.next()?;
        Ok(format!("contents of {remote}").into_bytes())
    }

    fn put(&self, _remote: &str, _data: &[u8]) -> Result<(), TransferError> {
        self.next()
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, TransferError> {
        self.next()?;
        let dir = dir.trim_end_matches('/');
        Ok(vec![format!("{dir}/a.csv"), format!("{dir}/b.csv")])
    }

    fn delete(&self, _remote: &str) -> Result<(), TransferError> {
        self.next()
    }
}
