//! Configuration types for licence-field extraction.
//!
//! All batch behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. Everything the pipeline needs (credentials
//! included) arrives through this struct; the library never reads the
//! process environment. The binary maps its flags and environment variables
//! onto the builder.

use crate::client::{is_openai, ModelClient};
use crate::error::ExtractError;
use crate::pipeline::parse::{ParseOptions, UnknownLabelPolicy};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default per-call timeout in seconds.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 60;

/// Configuration for one extraction batch.
///
/// # Example
/// ```rust
/// use edgequake_license2table::ExtractionConfig;
/// use std::time::Duration;
///
/// let config = ExtractionConfig::builder()
///     .api_key("sk-...")
///     .model("gpt-4o")
///     .concurrency(8)
///     .deadline(Duration::from_secs(300))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Files processed at the same time. Default: 4.
    ///
    /// Each file costs one model round-trip, so concurrency cuts wall-clock
    /// time almost linearly until the provider starts answering `429`.
    /// `1` processes files strictly one after another.
    pub concurrency: usize,

    /// Model identifier. If None, uses [`crate::client::DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Provider name. `None` or `"openai"` selects the built-in
    /// OpenAI-compatible client; anything else goes through edgequake-llm.
    pub provider_name: Option<String>,

    /// API key for the OpenAI-compatible client.
    pub api_key: Option<String>,

    /// Base URL for the OpenAI-compatible client, e.g. a local vLLM server.
    pub base_url: Option<String>,

    /// Pre-constructed client. Takes precedence over every other provider knob.
    pub client: Option<Arc<dyn ModelClient>>,

    /// Sampling temperature. Default: 0.0, transcription wants no creativity.
    pub temperature: f32,

    /// Maximum tokens the model may generate per image. Default: 1024.
    pub max_tokens: usize,

    /// Retries per file on a retryable model failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Wall-clock budget for the whole batch. Default: none.
    ///
    /// Files not finished when it expires are reported as
    /// [`crate::error::FileError::Timeout`]; finished rows are kept.
    pub deadline: Option<Duration>,

    /// Custom system role. If None, uses [`crate::prompts::DEFAULT_SYSTEM_ROLE`].
    pub system_prompt: Option<String>,

    /// Custom instruction. If None, uses [`crate::prompts::DEFAULT_INSTRUCTION`].
    pub instruction: Option<String>,

    /// What to do with labels outside the four recognised fields. Default: drop.
    pub unknown_labels: UnknownLabelPolicy,

    /// Fold full-width alphanumerics in values to half-width. Default: false.
    pub normalize_width: bool,

    /// Image detail hint for OpenAI-style APIs. Default: high.
    pub image_detail: ImageDetail,

    /// Per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            model: None,
            provider_name: None,
            api_key: None,
            base_url: None,
            client: None,
            temperature: 0.0,
            max_tokens: 1024,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: DEFAULT_API_TIMEOUT_SECS,
            deadline: None,
            system_prompt: None,
            instruction: None,
            unknown_labels: UnknownLabelPolicy::default(),
            normalize_width: false,
            image_detail: ImageDetail::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("client", &self.client.as_ref().map(|c| c.name().to_string()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("deadline", &self.deadline)
            .field("unknown_labels", &self.unknown_labels)
            .field("normalize_width", &self.normalize_width)
            .field("image_detail", &self.image_detail)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Parser options carried by this config.
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            unknown_labels: self.unknown_labels,
            normalize_width: self.normalize_width,
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.config.deadline = Some(deadline);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.instruction = Some(instruction.into());
        self
    }

    pub fn unknown_labels(mut self, policy: UnknownLabelPolicy) -> Self {
        self.config.unknown_labels = policy;
        self
    }

    pub fn normalize_width(mut self, v: bool) -> Self {
        self.config.normalize_width = v;
        self
    }

    pub fn image_detail(mut self, detail: ImageDetail) -> Self {
        self.config.image_detail = detail;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// This is the fail-fast point for credentials: when the built-in
    /// OpenAI-compatible client will be used, a missing or blank API key is
    /// rejected here, before any directory is read.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(ExtractError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.deadline.is_some_and(|d| d.is_zero()) {
            return Err(ExtractError::InvalidConfig(
                "Deadline must be greater than zero".into(),
            ));
        }

        let uses_builtin_client =
            c.client.is_none() && c.provider_name.as_deref().map_or(true, is_openai);
        let has_key = c.api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        if uses_builtin_client && !has_key {
            return Err(ExtractError::MissingApiKey {
                provider: c
                    .provider_name
                    .clone()
                    .unwrap_or_else(|| "openai".to_string()),
            });
        }

        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Resolution hint for OpenAI-style image inputs.
///
/// Licence numbers are small print; `High` lets the model tile the scan
/// instead of reading a single downscaled overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageDetail {
    Low,
    #[default]
    High,
    Auto,
}

impl ImageDetail {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageDetail::Low => "low",
            ImageDetail::High => "high",
            ImageDetail::Auto => "auto",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ExtractionConfig::default();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.unknown_labels, UnknownLabelPolicy::Drop);
        assert!(config.deadline.is_none());
    }

    #[test]
    fn missing_api_key_fails_fast() {
        let err = ExtractionConfig::builder().build().unwrap_err();
        assert!(matches!(err, ExtractError::MissingApiKey { .. }));

        let err = ExtractionConfig::builder().api_key("   ").build().unwrap_err();
        assert!(matches!(err, ExtractError::MissingApiKey { .. }));

        let err = ExtractionConfig::builder()
            .provider_name("openai")
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::MissingApiKey { .. }));
    }

    #[test]
    fn other_providers_manage_their_own_credentials() {
        assert!(ExtractionConfig::builder()
            .provider_name("anthropic")
            .build()
            .is_ok());
    }

    #[test]
    fn setters_clamp() {
        let config = ExtractionConfig::builder()
            .api_key("sk")
            .concurrency(0)
            .temperature(5.0)
            .build()
            .unwrap();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.temperature, 2.0);
    }

    #[test]
    fn zero_deadline_rejected() {
        let err = ExtractionConfig::builder()
            .api_key("sk")
            .deadline(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ExtractionConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn parse_options_follow_config() {
        let config = ExtractionConfig::builder()
            .api_key("sk")
            .unknown_labels(UnknownLabelPolicy::Keep)
            .normalize_width(true)
            .build()
            .unwrap();
        let options = config.parse_options();
        assert_eq!(options.unknown_labels, UnknownLabelPolicy::Keep);
        assert!(options.normalize_width);
    }
}
