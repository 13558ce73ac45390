use std::num::NonZeroUsize;
use std::time::Duration;
use url::Url;

use crate::{Error, Result};

/// Connection settings and per-request defaults for a generation client.
///
/// `base_url` points at the local model runner (an Ollama-compatible server).
/// The remaining fields are substituted into any request that leaves the
/// matching knob unset, so two requests that rely on defaults and two that
/// spell them out explicitly are indistinguishable downstream.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, scheme and authority only (e.g. `http://localhost:11434`).
    pub base_url: String,
    /// Model tag used when a request names none.
    pub default_model: String,
    /// Sampling temperature used when a request names none. Valid range is
    /// whatever the model runner accepts; Ollama treats 0.0 as greedy.
    pub default_temperature: f32,
    /// Completion-length cap used when a request names none.
    pub default_max_tokens: u32,
    /// Per-attempt deadline. When it fires the in-flight connection is
    /// dropped, not merely abandoned.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "llama3".to_string(),
            default_temperature: 0.7,
            default_max_tokens: 1024,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server root URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the fallback model tag
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the fallback sampling temperature
    pub fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = temperature;
        self
    }

    /// Set the fallback completion-length cap
    pub fn with_default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }

    /// Set the per-attempt deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Validate and canonicalize a server root URL. Trailing slashes are trimmed
/// so path joins stay predictable (`{base}/api/generate`).
pub(crate) fn normalize_base_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw)
        .map_err(|e| Error::config(format!("invalid base URL '{raw}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::config(format!(
                "unsupported base URL scheme '{other}' (expected http or https)"
            )))
        }
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// Circuit breaker tuning.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker open.
    pub failure_threshold: u32,
    /// How long the breaker refuses traffic before admitting probes.
    pub open_timeout: Duration,
    /// Consecutive half-open successes required to close again.
    pub recovery_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
            recovery_threshold: 2,
        }
    }
}

impl BreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set the open window duration
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Set the recovery threshold
    pub fn with_recovery_threshold(mut self, threshold: u32) -> Self {
        self.recovery_threshold = threshold.max(1);
        self
    }
}

/// Retry orchestration tuning.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempt budget, the first attempt included.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles per subsequent failure.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attempt budget
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the initial backoff delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }
}

/// Response cache tuning.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether completed responses are stored and served at all.
    pub enabled: bool,
    /// Entry cap; `None` keeps the cache unbounded, which suits the expected
    /// deployment of one process serving a handful of clinical users.
    pub max_entries: Option<NonZeroUsize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: None,
        }
    }
}

impl CacheConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the cache
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Cap the cache at `max_entries`, evicting least-recently used entries
    /// beyond it. Zero keeps the cache unbounded.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = NonZeroUsize::new(max_entries);
        self
    }
}
