//! Model clients: the boundary between the pipeline and a vision LLM.
//!
//! The pipeline only knows [`ModelClient`]: send one [`ExtractionRequest`],
//! get text back or a [`ModelError`]. The crate ships one implementation,
//! [`ProviderClient`], which wraps an [`edgequake_llm::LLMProvider`]:
//!
//! * [`ProviderClient::openai`] builds the default backend, edgequake-llm's
//!   OpenAI provider pointed at OpenAI or any OpenAI-compatible endpoint
//!   (Azure gateways, vLLM, LiteLLM, Ollama). The API key is a constructor
//!   argument; nothing here reads the process environment.
//! * [`ProviderClient::from_factory`] instantiates any other provider that
//!   crate supports (Anthropic, Gemini, Mistral, …).
//!
//! Tests substitute their own implementation through
//! [`crate::config::ExtractionConfigBuilder::client`].

use crate::config::{ExtractionConfig, ImageDetail};
use crate::error::{ExtractError, ModelError};
use crate::pipeline::prompt::ExtractionRequest;
use async_trait::async_trait;
use edgequake_llm::{
    ChatMessage, CompletionOptions, ImageData, LLMProvider, LlmError, OpenAIProvider,
    ProviderFactory,
};
use std::sync::Arc;
use tracing::debug;

/// Default endpoint of [`ProviderClient::openai`].
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default vision model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Sampling settings sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionSettings {
    pub temperature: f32,
    pub max_tokens: usize,
    pub detail: ImageDetail,
}

impl CompletionSettings {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            detail: config.image_detail,
        }
    }
}

/// The unparsed text of one completion plus token usage, when reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl ExtractionResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// A vision-capable model: one request in, free text out.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Short identifier used in logs, e.g. `openai/gpt-4o`.
    fn name(&self) -> &str;

    async fn complete(
        &self,
        request: &ExtractionRequest,
        settings: &CompletionSettings,
    ) -> Result<ExtractionResponse, ModelError>;
}

/// Build the client described by `config`, from most to least specific.
///
/// 1. A pre-built client (`config.client`) is used as-is.
/// 2. A provider name other than `openai` goes through
///    [`ProviderFactory::create_llm_provider`].
/// 3. Otherwise [`ProviderClient::openai`] is built from `api_key`,
///    `base_url` and `model`; a missing key fails here, before any file is read.
pub fn resolve_client(config: &ExtractionConfig) -> Result<Arc<dyn ModelClient>, ExtractError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        if !is_openai(name) {
            let client = ProviderClient::from_factory(name, model)?
                .timeout_secs(config.api_timeout_secs);
            return Ok(Arc::new(client));
        }
    }

    let api_key = config.api_key.clone().unwrap_or_default();
    let client = ProviderClient::openai(api_key, config.base_url.as_deref(), model)?
        .timeout_secs(config.api_timeout_secs);
    Ok(Arc::new(client))
}

pub(crate) fn is_openai(provider_name: &str) -> bool {
    matches!(
        provider_name.to_ascii_lowercase().as_str(),
        "openai" | "openai-compatible"
    )
}

// ── edgequake-llm adapter ────────────────────────────────────────────────────

/// Adapter running extraction requests through an edgequake-llm provider.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    label: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("label", &self.label)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
            timeout_secs: crate::config::DEFAULT_API_TIMEOUT_SECS,
        }
    }

    /// Seconds reported in [`ModelError::Timeout`] when the provider times out.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// OpenAI, or any OpenAI-compatible endpoint, with an explicit key.
    ///
    /// Nothing here reads the process environment. Fails with
    /// [`ExtractError::MissingApiKey`] on an empty key.
    pub fn openai(
        api_key: impl Into<String>,
        base_url: Option<&str>,
        model: &str,
    ) -> Result<Self, ExtractError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ExtractError::MissingApiKey {
                provider: "openai".to_string(),
            });
        }

        let base_url = base_url
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        debug!("OpenAI provider: base_url={base_url} model={model}");
        let provider = OpenAIProvider::compatible(api_key, base_url).with_model(model);
        Ok(Self::new(Arc::new(provider), format!("openai/{model}")))
    }

    /// Instantiate a named provider through [`ProviderFactory`].
    ///
    /// The provider reads its own credentials; a missing key surfaces here
    /// as [`ExtractError::ProviderNotConfigured`].
    pub fn from_factory(provider_name: &str, model: &str) -> Result<Self, ExtractError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            ExtractError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, format!("{provider_name}/{model}")))
    }
}

#[async_trait]
impl ModelClient for ProviderClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(
        &self,
        request: &ExtractionRequest,
        settings: &CompletionSettings,
    ) -> Result<ExtractionResponse, ModelError> {
        let image = ImageData::new(request.payload().to_string(), request.media_type())
            .with_detail(settings.detail.as_str());
        let messages = vec![
            ChatMessage::system(request.system_role()),
            ChatMessage::user_with_images(request.instruction(), vec![image]),
        ];
        let options = CompletionOptions {
            temperature: Some(settings.temperature),
            max_tokens: Some(settings.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_provider_error(e, self.timeout_secs))?;

        if response.content.trim().is_empty() {
            return Err(ModelError::Malformed {
                detail: "completion has no message content".to_string(),
            });
        }

        Ok(ExtractionResponse {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

/// Map an edgequake-llm error onto the [`ModelError`] taxonomy.
fn classify_provider_error(err: LlmError, timeout_secs: u64) -> ModelError {
    match err {
        LlmError::Timeout => ModelError::Timeout { secs: timeout_secs },
        LlmError::RateLimited(_) => ModelError::RateLimited {
            retry_after_secs: None,
        },
        LlmError::AuthError(detail) => ModelError::Auth { detail },
        LlmError::InvalidRequest(detail)
        | LlmError::ModelNotFound(detail)
        | LlmError::ConfigError(detail)
        | LlmError::NotSupported(detail) => ModelError::Rejected { detail },
        e @ LlmError::TokenLimitExceeded { .. } => ModelError::Rejected {
            detail: e.to_string(),
        },
        e @ LlmError::SerializationError(_) => ModelError::Malformed {
            detail: e.to_string(),
        },
        LlmError::NetworkError(message)
        | LlmError::ApiError(message)
        | LlmError::ProviderError(message)
        | LlmError::Unknown(message) => ModelError::Api {
            status: None,
            message,
        },
    }
}
