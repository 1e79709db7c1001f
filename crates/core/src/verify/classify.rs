use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Why an entry was accepted or rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeReason {
    Success,
    Status(u16),
    Timeout,
    ConnectionReset,
    Network(String),
    ProxyFailed { proxy: String, message: String },
    AllIdentitiesFailed,
}

impl fmt::Display for ProbeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeReason::Success => f.write_str("success"),
            ProbeReason::Status(code) => write!(f, "status: {code}"),
            ProbeReason::Timeout => f.write_str("timeout"),
            ProbeReason::ConnectionReset => f.write_str("connection reset"),
            ProbeReason::Network(message) => write!(f, "network error: {message}"),
            ProbeReason::ProxyFailed { proxy, message } => {
                write!(f, "proxy {proxy} failed: {message}")
            }
            ProbeReason::AllIdentitiesFailed => f.write_str("all identities failed"),
        }
    }
}

/// Result of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Alive(ProbeReason),
    Failed(ProbeReason),
    /// Try the next identity without recording anything.
    Retry,
    /// The proxy itself is unusable; skip its remaining attempts.
    RouteDown(ProbeReason),
}

pub fn classify_status(status: u16) -> Verdict {
    match status {
        200..=399 => Verdict::Alive(ProbeReason::Success),
        403 | 405 | 429 => Verdict::Alive(ProbeReason::Status(status)),
        other => Verdict::Failed(ProbeReason::Status(other)),
    }
}

/// The parts of a transport error the classifier looks at.
#[derive(Debug, Clone)]
pub struct TransportFailure {
    pub timed_out: bool,
    pub connect: bool,
    pub io_kind: Option<io::ErrorKind>,
    pub message: String,
}

impl TransportFailure {
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        Self {
            timed_out: err.is_timeout(),
            connect: err.is_connect(),
            io_kind: io_error_kind(err),
            message: err.to_string(),
        }
    }
}

pub fn classify_failure(failure: &TransportFailure, proxy: Option<&str>) -> Verdict {
    if failure.timed_out {
        return Verdict::Failed(ProbeReason::Timeout);
    }
    match failure.io_kind {
        Some(io::ErrorKind::ConnectionReset) => return Verdict::Alive(ProbeReason::ConnectionReset),
        Some(io::ErrorKind::ConnectionAborted) => return Verdict::Retry,
        Some(io::ErrorKind::TimedOut) => return Verdict::Failed(ProbeReason::Timeout),
        _ => {}
    }
    match proxy {
        Some(proxy) if failure.connect => Verdict::RouteDown(ProbeReason::ProxyFailed {
            proxy: proxy.to_string(),
            message: failure.message.clone(),
        }),
        _ => Verdict::Failed(ProbeReason::Network(failure.message.clone())),
    }
}

/// First `io::Error` kind found on the error or anywhere in its source chain.
pub fn io_error_kind(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}
