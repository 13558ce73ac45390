//! Client facade: cache, breaker, retry and transport composed behind two
//! calls, `generate` and `generate_stream`.
//!
//! Layering is fixed: cache lookup first (a hit answers even while the
//! breaker is open), then the breaker gate, then retry-wrapped transport
//! attempts. Every attempt outcome feeds the breaker, so concurrent callers
//! converge on the same upstream-health verdict.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::{ready, Stream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{CacheStats, Fingerprint, ResponseCache};
use crate::config::{BreakerConfig, CacheConfig, ClientConfig, RetryConfig};
use crate::resilience::{BreakerSnapshot, CircuitBreaker, RetryPolicy};
use crate::transport::{HttpTransport, StreamChunk};
use crate::types::{GenerationRequest, GenerationResponse, ResolvedRequest};
use crate::{BoxStream, Error, Result};

/// Resilient client for one generation server. One instance per process;
/// the breaker and cache are only meaningful when every call flows through
/// the same instance. All methods take `&self` and the client is `Send +
/// Sync`, so share it behind an [`Arc`].
pub struct GenClient {
    config: ClientConfig,
    transport: HttpTransport,
    cache: ResponseCache,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

/// Point-in-time runtime signals for admin endpoints and tests.
#[derive(Debug, Clone)]
pub struct ClientSignals {
    pub breaker: BreakerSnapshot,
    pub cache: CacheStats,
}

impl GenClient {
    /// Client with default resilience settings against `base_url`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        GenClientBuilder::new().config(config).build()
    }

    pub fn builder() -> GenClientBuilder {
        GenClientBuilder::new()
    }

    /// Canonical server root this client talks to.
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Breaker handle for admin tooling and tests.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Snapshot current runtime signals (facts only) for application-layer
    /// orchestration.
    pub fn signals(&self) -> ClientSignals {
        ClientSignals {
            breaker: self.breaker.snapshot(),
            cache: self.cache.stats(),
        }
    }

    /// Run one generation to completion and return the full text.
    ///
    /// A cache hit returns immediately. Otherwise the call runs under the
    /// breaker gate and the retry budget, and a completed response is
    /// cached before returning.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let resolved = ResolvedRequest::new(request, &self.config);
        let fingerprint = Fingerprint::of(
            &resolved.prompt,
            resolved.system_prompt.as_deref(),
            resolved.temperature,
            &resolved.model,
        );
        if let Some(text) = self.cache.get(&fingerprint) {
            debug!(fingerprint = %fingerprint, "serving generation from cache");
            return Ok(GenerationResponse { text, done: true });
        }

        self.gate()?;
        let call_id = Uuid::new_v4().to_string();
        let start = Instant::now();
        let response = self
            .retry
            .run(&self.breaker, self.transport.base_url(), |_attempt| {
                self.transport.generate(&resolved)
            })
            .await?;
        info!(
            call_id = %call_id,
            model = %resolved.model,
            duration_ms = start.elapsed().as_millis() as u64,
            chars = response.text.len(),
            "generation complete"
        );
        self.cache.set(fingerprint, response.text.clone());
        Ok(response)
    }

    /// Open a streaming generation and return the fragment stream.
    ///
    /// Retry covers connection establishment only: once this returns, the
    /// upstream has accepted the request and fragments are on their way.
    /// Mid-stream failures surface on the stream as
    /// [`Error::StreamDecode`]; no attempt is made to splice a retried
    /// connection into a half-delivered completion. Streamed text is never
    /// written to the cache. Dropping the stream aborts the connection.
    pub async fn generate_stream(&self, request: GenerationRequest) -> Result<GenerationStream> {
        let resolved = ResolvedRequest::new(request, &self.config);
        self.gate()?;
        let call_id = Uuid::new_v4().to_string();
        let chunks = self
            .retry
            .run(&self.breaker, self.transport.base_url(), |_attempt| {
                self.transport.begin_stream(&resolved)
            })
            .await?;
        debug!(call_id = %call_id, model = %resolved.model, "stream established");
        Ok(GenerationStream::new(chunks))
    }

    /// List the model tags installed on the server.
    ///
    /// Diagnostic call; it bypasses the breaker and the retry budget so a
    /// health page stays readable while the breaker is open.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        self.transport.list_models().await
    }

    /// Fire one tiny generation so the server loads model weights before
    /// the first real request. Failures are logged and swallowed; a cold
    /// model is a latency problem, not a correctness one.
    pub async fn warmup(&self) {
        let request = GenerationRequest::new("Respond with the single word: ready")
            .temperature(0.0)
            .max_tokens(8);
        match self.generate(request).await {
            Ok(_) => info!(base_url = %self.base_url(), "warm-up generation succeeded"),
            Err(err) => warn!(
                base_url = %self.base_url(),
                error = %err,
                "warm-up generation failed, continuing cold"
            ),
        }
    }

    /// Run [`warmup`](Self::warmup) in the background so startup is not
    /// held hostage by model loading.
    pub fn spawn_warmup(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move { client.warmup().await })
    }

    /// Fail fast while the breaker is open.
    fn gate(&self) -> Result<()> {
        if self.breaker.is_open() {
            let retry_in = self.breaker.open_remaining().unwrap_or_default();
            warn!(
                base_url = %self.base_url(),
                retry_in_ms = retry_in.as_millis() as u64,
                "circuit open, refusing call"
            );
            return Err(Error::CircuitOpen {
                base_url: self.base_url().to_string(),
                retry_in,
            });
        }
        Ok(())
    }
}

/// Incremental completion text, one fragment per poll.
///
/// Pull-based: fragments are decoded as the consumer asks for them, there is
/// no internal buffering task. Inert chunks (metadata-only lines and bare
/// completion markers) are skipped so every yielded item carries text.
/// Dropping the stream drops the underlying connection, which is the
/// cancellation path for consumers that stop early.
pub struct GenerationStream {
    inner: BoxStream<'static, StreamChunk>,
}

impl GenerationStream {
    fn new(inner: BoxStream<'static, StreamChunk>) -> Self {
        Self { inner }
    }
}

impl std::fmt::Debug for GenerationStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationStream").finish_non_exhaustive()
    }
}

impl Stream for GenerationStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => match chunk.response {
                    Some(text) if !text.is_empty() => return Poll::Ready(Some(Ok(text))),
                    _ => continue,
                },
                Some(Err(err)) => return Poll::Ready(Some(Err(err))),
                None => return Poll::Ready(None),
            }
        }
    }
}

/// Builder wiring the four layers together.
#[derive(Debug, Clone, Default)]
pub struct GenClientBuilder {
    config: ClientConfig,
    breaker: BreakerConfig,
    retry: RetryConfig,
    cache: CacheConfig,
}

impl GenClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the connection and default-parameter configuration wholesale.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.config.default_model = model.into();
        self
    }

    pub fn default_temperature(mut self, temperature: f32) -> Self {
        self.config.default_temperature = temperature;
        self
    }

    pub fn default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.default_max_tokens = max_tokens;
        self
    }

    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Validate the configuration and construct the client. The only
    /// fallible part is the base URL and HTTP client setup; resilience
    /// settings are clamped to sane floors by their own setters.
    pub fn build(self) -> Result<GenClient> {
        let transport = HttpTransport::new(&self.config)?;
        Ok(GenClient {
            transport,
            cache: ResponseCache::new(&self.cache),
            breaker: CircuitBreaker::new(self.breaker),
            retry: RetryPolicy::new(&self.retry),
            config: self.config,
        })
    }
}
