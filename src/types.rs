use crate::config::ClientConfig;

/// A single text-generation request.
///
/// Only `prompt` is mandatory. Optional knobs left as `None` inherit the
/// client-wide defaults at dispatch time, so a request built with just
/// [`GenerationRequest::new`] is already complete.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// The task the model is asked to perform.
    pub prompt: String,
    /// Behavioral instruction framing the model's role.
    pub system_prompt: Option<String>,
    /// Background material the model should ground its answer in.
    pub context: Option<String>,
    /// Model tag override.
    pub model: Option<String>,
    /// Sampling temperature override.
    pub temperature: Option<f32>,
    /// Completion-length cap override.
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Create a request carrying only the task prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Attach a role instruction.
    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Attach grounding context.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Override the model tag for this request only.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override the sampling temperature for this request only.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Override the completion-length cap for this request only.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A completed (non-streaming) generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    /// Full completion text.
    pub text: String,
    /// Completion flag as reported by the server. Cached responses always
    /// carry `true`.
    pub done: bool,
}

/// A request with every default substituted. Past this point the optional
/// knobs are gone, which keeps cache fingerprints and wire payloads
/// identical for "explicit default" and "omitted" requests.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub context: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ResolvedRequest {
    pub(crate) fn new(request: GenerationRequest, config: &ClientConfig) -> Self {
        Self {
            prompt: request.prompt,
            system_prompt: request.system_prompt,
            context: request.context,
            model: request
                .model
                .unwrap_or_else(|| config.default_model.clone()),
            temperature: request
                .temperature
                .unwrap_or(config.default_temperature),
            max_tokens: request.max_tokens.unwrap_or(config.default_max_tokens),
        }
    }
}
