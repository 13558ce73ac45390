//! # genguard
//!
//! 本地文本生成服务的弹性客户端：熔断、重试退避、响应缓存与增量流解码。
//!
//! Resilient client for locally hosted text-generation servers speaking the
//! Ollama generate API. Local model runners fail in ways cloud SDKs never
//! plan for: the daemon is not started, the model is still loading, the GPU
//! is busy, a completion takes thirty seconds. This crate wraps those
//! failure modes so the calling application degrades instead of hanging.
//!
//! ## Core Behaviors
//!
//! - **Fail fast**: a three-state circuit breaker refuses calls while the
//!   upstream is known-bad, with probe-based recovery
//! - **Retry with backoff**: transient failures are retried on an
//!   exponential schedule before anyone hears about them
//! - **Serve from memory**: completed generations are cached by request
//!   fingerprint, and a hit answers even while the breaker is open
//! - **Stream incrementally**: newline-delimited JSON fragments are decoded
//!   and handed over as they arrive, not after the model finishes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use genguard::{GenClient, GenerationRequest};
//!
//! #[tokio::main]
//! async fn main() -> genguard::Result<()> {
//!     let client = GenClient::builder()
//!         .base_url("http://localhost:11434")
//!         .default_model("llama3")
//!         .build()?;
//!
//!     // Full completion in one call.
//!     let response = client
//!         .generate(GenerationRequest::new("Summarize the visit notes"))
//!         .await?;
//!     println!("{}", response.text);
//!
//!     // Or fragment by fragment.
//!     let mut stream = client
//!         .generate_stream(GenerationRequest::new("Summarize the visit notes"))
//!         .await?;
//!     while let Some(fragment) = stream.next().await {
//!         print!("{}", fragment?);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Facade composing cache, breaker, retry and transport |
//! | [`config`] | Connection defaults and resilience tuning |
//! | [`types`] | Request and response types |
//! | [`cache`] | Fingerprint-keyed response cache |
//! | [`resilience`] | Circuit breaker and retry policy |
//! | [`transport`] | HTTP dispatch and incremental NDJSON decoding |

pub mod cache;
pub mod client;
pub mod config;
pub mod resilience;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use cache::{CacheStats, Fingerprint};
pub use client::{ClientSignals, GenClient, GenClientBuilder, GenerationStream};
pub use config::{BreakerConfig, CacheConfig, ClientConfig, RetryConfig};
pub use resilience::{BreakerSnapshot, CircuitBreaker, CircuitState, RetryPolicy};
pub use types::{GenerationRequest, GenerationResponse};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::Error;
