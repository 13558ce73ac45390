//! 弹性模式模块：提供熔断器与重试退避等可靠性保障机制。
//!
//! # Resilience Primitives Module
//!
//! This module keeps a flaky local model runner from taking the calling
//! application down with it: failures are detected fast, retried with
//! backoff, and cut off entirely once the upstream is clearly unhealthy.
//!
//! ## Overview
//!
//! Resilience patterns matter here because:
//! - A single machine hosts both this process and the model runner
//! - Model loading and GPU contention produce bursts of slow failures
//! - Hammering a struggling runner with retries makes recovery slower
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CircuitBreaker`] | Three-state breaker for failure isolation |
//! | [`RetryPolicy`] | Exponential-backoff retry orchestration |
//!
//! ## Circuit Breaker
//!
//! The breaker prevents repeated calls to a failing upstream:
//! - **Closed**: normal operation, calls pass through
//! - **Open**: failure threshold reached, calls fail fast
//! - **Half-Open**: open window elapsed, probes test recovery
//!
//! ```rust
//! use genguard::config::BreakerConfig;
//! use genguard::resilience::CircuitBreaker;
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new(
//!     BreakerConfig::new()
//!         .with_failure_threshold(5)
//!         .with_open_timeout(Duration::from_secs(60)),
//! );
//!
//! if !breaker.is_open() {
//!     // Dispatch the call...
//!     breaker.record_success();
//! }
//! ```
//!
//! ## Retry Orchestration
//!
//! [`RetryPolicy::run`] drives an async attempt closure under an attempt
//! budget, doubling the delay after each transport-class failure and
//! reporting every outcome to the shared breaker. Waits use the async timer,
//! so a stuck upstream never blocks unrelated tasks.

mod breaker;
mod retry;

pub use breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use retry::RetryPolicy;
