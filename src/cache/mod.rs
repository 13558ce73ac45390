//! 响应缓存模块：以请求指纹为键复用已完成的生成结果。
//!
//! # Response Caching Module
//!
//! This module serves repeated generation requests from memory instead of
//! re-running inference. Local model runners take seconds per completion, so
//! a hit here is worth far more than the usual HTTP-cache win.
//!
//! ## Overview
//!
//! Caching is valuable for:
//! - Skipping multi-second inference for repeated prompts
//! - Serving answers while the upstream is down or the breaker is open
//! - Keeping demo and test workflows deterministic
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Fingerprint`] | SHA-256 identity over the cacheable request fields |
//! | [`ResponseCache`] | Fingerprint-keyed store with hit/miss statistics |
//! | [`CacheStats`] | Counter snapshot for observability |
//!
//! ## Fingerprinting
//!
//! Fingerprints cover the fields that change what the model would say:
//! prompt, role instruction, model tag and temperature, with client defaults
//! substituted before hashing. Grounding context is deliberately excluded
//! because callers vary it per patient encounter; including it would make
//! hits vanishingly rare. The completion-length cap is excluded for the same
//! reason.
//!
//! Only completed, non-streaming responses are stored. A lookup is answered
//! before any resilience machinery runs, so a hit succeeds even while the
//! circuit breaker refuses network traffic.

mod key;
mod store;

pub use key::Fingerprint;
pub use store::{CacheStats, ResponseCache};
