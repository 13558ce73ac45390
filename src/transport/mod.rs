//! 传输层模块：HTTP 适配与流式 NDJSON 增量解码。
//!
//! # Transport Module
//!
//! Everything that touches a socket lives here: dispatching generation
//! requests over HTTP, enforcing per-attempt deadlines, and turning the
//! server's newline-delimited JSON body into typed chunks as bytes arrive.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`HttpTransport`] | Request dispatch, deadline enforcement, status checks |
//! | [`decode_chunks`] | Incremental NDJSON decoder over a byte stream |
//! | [`StreamChunk`] | One parsed line of a streaming response |
//!
//! ## Wire Contract
//!
//! The server speaks the Ollama generate API: `POST {base}/api/generate`
//! with `{model, prompt, stream, options:{temperature, num_predict}}`.
//! Non-streaming replies are a single JSON object; streaming replies are one
//! JSON object per line until a line sets `done`. Model discovery uses
//! `GET {base}/api/tags`.

mod decode;
mod http;

pub use decode::{decode_chunks, StreamChunk};
pub use http::HttpTransport;
