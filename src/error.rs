use std::time::Duration;
use thiserror::Error;

/// Unified error type for the genguard runtime.
///
/// The taxonomy mirrors the failure-isolation layers: breaker refusals fail
/// fast before any socket work, per-attempt failures circulate inside the
/// retry orchestrator, and only aggregate or stream-scoped failures reach
/// callers.
#[derive(Debug, Error)]
pub enum Error {
    /// The circuit breaker is open; the call was refused without touching
    /// the network.
    #[error("Circuit breaker open for {base_url}: next probe in {retry_in:?}")]
    CircuitOpen { base_url: String, retry_in: Duration },

    /// A single attempt exceeded the configured request timeout. The
    /// in-flight connection was aborted when the deadline fired.
    #[error("Request to {base_url} timed out after {timeout:?}")]
    Timeout { base_url: String, timeout: Duration },

    /// Connectivity failed before an HTTP status was obtained (refused
    /// connection, DNS failure, broken socket).
    #[error("Transport failure reaching {base_url}: {source}")]
    Transport {
        base_url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status. The body text is carried
    /// verbatim so callers can log what the model runner reported.
    #[error("Upstream {base_url} answered HTTP {status}: {body}")]
    UpstreamStatus {
        base_url: String,
        status: u16,
        body: String,
    },

    /// Every attempt in the retry budget failed; wraps the final failure.
    #[error("All {attempts} attempts against {base_url} failed: {source}")]
    RetryExhausted {
        attempts: u32,
        base_url: String,
        #[source]
        source: Box<Error>,
    },

    /// The response stream broke after delivery had started. Fragments
    /// already handed to the consumer remain valid.
    #[error("Stream from {base_url} terminated mid-flight: {reason}")]
    StreamDecode {
        base_url: String,
        reason: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Invalid client configuration, raised at build time only.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config {
            message: msg.into(),
        }
    }

    /// Whether this error counts as an upstream-health signal: timeouts,
    /// connectivity failures and non-2xx replies all qualify. Breaker
    /// accounting and retry eligibility both key off this classification.
    pub fn is_transport_class(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Transport { .. } | Error::UpstreamStatus { .. }
        )
    }

    /// HTTP status reported by the upstream, when one was received. Walks
    /// through `RetryExhausted` so callers mapping onto gateway responses
    /// see the final attempt's status.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Error::UpstreamStatus { status, .. } => Some(*status),
            Error::RetryExhausted { source, .. } => source.upstream_status(),
            _ => None,
        }
    }
}
