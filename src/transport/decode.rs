//! Incremental decoding of the newline-delimited JSON response stream.

use bytes::{Bytes, BytesMut};
use futures::{stream, StreamExt};
use serde::Deserialize;
use tracing::debug;

use crate::{BoxStream, Error};

/// One parsed line of the streaming response body.
///
/// The server emits one JSON object per line; lines carry a text fragment,
/// a completion flag, both, or neither (metadata-only lines are inert).
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done: Option<bool>,
}

impl StreamChunk {
    /// Whether this line carries the completion flag.
    pub fn is_final(&self) -> bool {
        self.done == Some(true)
    }
}

/// Decode a raw byte stream into parsed chunks.
///
/// Lines may arrive split across reads or several per read; raw bytes
/// buffer until a full line is available, so a multi-byte character split
/// across reads reassembles before any UTF-8 decoding happens. Each
/// complete line parses independently; malformed lines (bad JSON or bad
/// UTF-8) are dropped rather than failing the stream. A line whose
/// completion flag is set is still emitted (it may carry a final fragment),
/// after which the stream ends without reading further input. A read error
/// surfaces once as [`Error::StreamDecode`] and also ends the stream, since
/// the connection under it is gone.
pub fn decode_chunks(
    base_url: String,
    input: BoxStream<'static, Bytes>,
) -> BoxStream<'static, StreamChunk> {
    let stream = stream::unfold(
        (input, BytesMut::new(), false),
        move |(mut input, mut buf, finished)| {
            let base_url = base_url.clone();
            async move {
                if finished {
                    return None;
                }
                loop {
                    if let Some(idx) = buf.iter().position(|&b| b == b'\n') {
                        let taken = buf.split_to(idx + 1);
                        let line = &taken[..idx];
                        if line.iter().all(|b| b.is_ascii_whitespace()) {
                            continue;
                        }
                        match serde_json::from_slice::<StreamChunk>(line) {
                            Ok(chunk) => {
                                let last = chunk.is_final();
                                return Some((Ok(chunk), (input, buf, last)));
                            }
                            Err(err) => {
                                debug!(error = %err, "discarding malformed stream line");
                                continue;
                            }
                        }
                    }

                    match input.next().await {
                        Some(Ok(bytes)) => {
                            buf.extend_from_slice(&bytes);
                            continue;
                        }
                        Some(Err(err)) => {
                            let wrapped = Error::StreamDecode {
                                base_url: base_url.clone(),
                                reason: "response body read failed".to_string(),
                                source: Some(Box::new(err)),
                            };
                            return Some((Err(wrapped), (input, buf, true)));
                        }
                        None => {
                            // EOF without a completion flag: flush one
                            // trailing unterminated line if it parses.
                            if buf.iter().all(|b| b.is_ascii_whitespace()) {
                                return None;
                            }
                            match serde_json::from_slice::<StreamChunk>(&buf) {
                                Ok(chunk) => {
                                    return Some((Ok(chunk), (input, BytesMut::new(), true)))
                                }
                                Err(_) => return None,
                            }
                        }
                    }
                }
            }
        },
    );

    Box::pin(stream)
}
