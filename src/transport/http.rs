use std::time::Duration;

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::decode::{decode_chunks, StreamChunk};
use crate::config::{normalize_base_url, ClientConfig};
use crate::types::{GenerationResponse, ResolvedRequest};
use crate::{BoxStream, Error, Result};

/// Wire payload for `POST /api/generate`. Field names and nesting are the
/// server's contract; sampler knobs ride inside `options`.
#[derive(Debug, Serialize)]
struct GeneratePayload<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct TagsReply {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// HTTP adapter for an Ollama-compatible generation server.
///
/// One instance per client; the inner connection pool is reused across
/// attempts. Deadlines are enforced by wrapping each attempt in the async
/// timer rather than on the pool client, so an expired deadline drops the
/// attempt future and tears down its connection with it.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = normalize_base_url(&config.base_url)?;
        // Connection establishment to a local runner is sub-second when the
        // server is up; a tight connect cap converts "daemon not running"
        // into a fast failure instead of consuming the request deadline.
        let connect_timeout = config.timeout.min(Duration::from_secs(5));
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Compose the single prompt string sent upstream.
    ///
    /// Framing is a compatibility contract with prompts already tuned
    /// against it: the task first, then the role instruction, then the
    /// grounding context, each under its own header, blank-line separated.
    /// Absent sections are omitted entirely.
    fn compose_prompt(request: &ResolvedRequest) -> String {
        let mut prompt = String::with_capacity(
            request.prompt.len()
                + request.system_prompt.as_ref().map_or(0, |s| s.len() + 16)
                + request.context.as_ref().map_or(0, |c| c.len() + 16),
        );
        prompt.push_str("### Task:\n");
        prompt.push_str(&request.prompt);
        if let Some(system) = &request.system_prompt {
            prompt.push_str("\n\n### Role:\n");
            prompt.push_str(system);
        }
        if let Some(context) = &request.context {
            prompt.push_str("\n\n### Context:\n");
            prompt.push_str(context);
        }
        prompt
    }

    fn payload(request: &ResolvedRequest, stream: bool) -> GeneratePayload<'_> {
        GeneratePayload {
            model: &request.model,
            prompt: Self::compose_prompt(request),
            stream,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }

    /// Map a client-side failure onto the error taxonomy.
    fn classify(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                base_url: self.base_url.clone(),
                timeout: self.timeout,
            }
        } else {
            Error::Transport {
                base_url: self.base_url.clone(),
                source: err,
            }
        }
    }

    /// Send one generation request and verify the status. The response body
    /// has not been consumed yet; callers decide between full-body and
    /// streaming reads.
    async fn post_generate(
        &self,
        request: &ResolvedRequest,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/api/generate", self.base_url);
        let request_id = Uuid::new_v4().to_string();
        debug!(
            request_id = %request_id,
            model = %request.model,
            stream,
            "dispatching generation request"
        );
        let resp = self
            .client
            .post(&url)
            // Correlation id; the server ignores it, log scrapers do not.
            .header("x-genguard-request-id", &request_id)
            .json(&Self::payload(request, stream))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::UpstreamStatus {
                base_url: self.base_url.clone(),
                status: status.as_u16(),
                body,
            });
        }
        debug!(request_id = %request_id, http_status = status.as_u16(), "generation request accepted");
        Ok(resp)
    }

    /// One non-streaming attempt under the configured deadline.
    pub async fn generate(&self, request: &ResolvedRequest) -> Result<GenerationResponse> {
        let attempt = async {
            let resp = self.post_generate(request, false).await?;
            let reply: GenerateReply = resp.json().await.map_err(|e| self.classify(e))?;
            Ok(GenerationResponse {
                text: reply.response,
                done: reply.done,
            })
        };
        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                base_url: self.base_url.clone(),
                timeout: self.timeout,
            }),
        }
    }

    /// One streaming attempt. The deadline covers connection establishment
    /// and the status line only; once fragments are flowing, delivery runs
    /// for as long as the model keeps talking.
    pub async fn begin_stream(
        &self,
        request: &ResolvedRequest,
    ) -> Result<BoxStream<'static, StreamChunk>> {
        let resp = match tokio::time::timeout(self.timeout, self.post_generate(request, true)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Timeout {
                    base_url: self.base_url.clone(),
                    timeout: self.timeout,
                })
            }
        };

        let base_url = self.base_url.clone();
        let err_url = base_url.clone();
        let bytes = resp.bytes_stream().map_err(move |e| Error::Transport {
            base_url: err_url.clone(),
            source: e,
        });
        Ok(decode_chunks(base_url, Box::pin(bytes)))
    }

    /// Fetch the model tags installed on the server (`GET /api/tags`).
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let attempt = async {
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| self.classify(e))?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::UpstreamStatus {
                    base_url: self.base_url.clone(),
                    status: status.as_u16(),
                    body,
                });
            }
            let tags: TagsReply = resp.json().await.map_err(|e| self.classify(e))?;
            Ok(tags.models.into_iter().map(|m| m.name).collect())
        };
        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                base_url: self.base_url.clone(),
                timeout: self.timeout,
            }),
        }
    }
}
