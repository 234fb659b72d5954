//! Configuration types for transcript extraction.
//!
//! All pipeline behaviour that is not fixed policy is controlled through
//! [`ExtractionConfig`], built via its [`ExtractionConfigBuilder`]. The
//! gates themselves have no knobs.
//!
//! Credentials are optional here and fall back to the environment at the
//! moment the adapters are built (see [`ExtractionConfig::analysis_credentials`]),
//! so a config can be constructed, logged and shared before any secret is
//! read.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Environment variable holding the layout service endpoint.
pub const ANALYSIS_ENDPOINT_ENV: &str = "AZURE_ENDPOINT";
/// Environment variable holding the layout service key.
pub const ANALYSIS_KEY_ENV: &str = "AZURE_KEY";

/// Configuration for an extraction.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use marksheet_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4o")
///     .identity_model("gpt-4o-mini")
///     .max_retries(1)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Model for table classification, grading-scale detection and marks
    /// extraction. Default: `gpt-4o`.
    ///
    /// These three tasks read HTML tables with merged cells; smaller models
    /// misjudge spans noticeably more often.
    pub model: String,

    /// Model for identity extraction from plain text. Default: `gpt-4o-mini`.
    pub identity_model: String,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider used for every task. Takes precedence
    /// over `provider_name` and both model fields.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Gate verdicts must be as repeatable as the model allows; any
    /// creativity here shows up as flapping accept/reject decisions.
    pub temperature: f32,

    /// Maximum tokens per oracle reply. Default: 4096.
    pub max_tokens: usize,

    /// Retries per oracle call on transport failure or unparseable reply. Default: 2.
    ///
    /// Gate rejections are never retried; they are verdicts, not failures.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Layout service endpoint, e.g. `https://<resource>.cognitiveservices.azure.com`.
    /// Falls back to `AZURE_ENDPOINT`.
    pub analysis_endpoint: Option<String>,

    /// Layout service subscription key. Falls back to `AZURE_KEY`.
    pub analysis_key: Option<String>,

    /// Layout service API version. Default: `2024-11-30`.
    pub analysis_api_version: String,

    /// Layout model id. Default: `prebuilt-layout`.
    pub analysis_model: String,

    /// Delay between polls of a running analysis in milliseconds. Default: 1000.
    ///
    /// A `Retry-After` header from the service overrides this per poll.
    pub poll_interval_ms: u64,

    /// Maximum polls before the analysis is reported unavailable. Default: 120.
    pub max_polls: u32,

    /// Timeout of each HTTP request to the layout service in seconds. Default: 120.
    pub http_timeout_secs: u64,

    /// Receives stage events while the pipeline runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            identity_model: "gpt-4o-mini".to_string(),
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            analysis_endpoint: None,
            analysis_key: None,
            analysis_api_version: "2024-11-30".to_string(),
            analysis_model: "prebuilt-layout".to_string(),
            poll_interval_ms: 1000,
            max_polls: 120,
            http_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("identity_model", &self.identity_model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("analysis_endpoint", &self.analysis_endpoint)
            .field("analysis_key", &self.analysis_key.as_ref().map(|_| "<redacted>"))
            .field("analysis_api_version", &self.analysis_api_version)
            .field("analysis_model", &self.analysis_model)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_polls", &self.max_polls)
            .field("http_timeout_secs", &self.http_timeout_secs)
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

    /// Layout service `(endpoint, key)`, from the config or the environment.
    pub fn analysis_credentials(&self) -> Result<(String, String), ExtractError> {
        let endpoint = setting_or_env(&self.analysis_endpoint, ANALYSIS_ENDPOINT_ENV).ok_or_else(|| {
            ExtractError::InvalidConfig(format!(
                "Layout analysis endpoint not configured. Set {ANALYSIS_ENDPOINT_ENV} or pass --azure-endpoint."
            ))
        })?;
        let key = setting_or_env(&self.analysis_key, ANALYSIS_KEY_ENV).ok_or_else(|| {
            ExtractError::InvalidConfig(format!(
                "Layout analysis key not configured. Set {ANALYSIS_KEY_ENV} or pass --azure-key."
            ))
        })?;
        Ok((endpoint.trim_end_matches('/').to_string(), key))
    }
}

fn setting_or_env(setting: &Option<String>, var: &str) -> Option<String> {
    setting
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| std::env::var(var).ok())
        .filter(|v| !v.trim().is_empty())
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn identity_model(mut self, model: impl Into<String>) -> Self {
        self.config.identity_model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
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

    pub fn analysis_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.analysis_endpoint = Some(endpoint.into());
        self
    }

    pub fn analysis_key(mut self, key: impl Into<String>) -> Self {
        self.config.analysis_key = Some(key.into());
        self
    }

    pub fn analysis_api_version(mut self, version: impl Into<String>) -> Self {
        self.config.analysis_api_version = version.into();
        self
    }

    pub fn analysis_model(mut self, model: impl Into<String>) -> Self {
        self.config.analysis_model = model.into();
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms.max(50);
        self
    }

    pub fn max_polls(mut self, n: u32) -> Self {
        self.config.max_polls = n.max(1);
        self
    }

    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.model.trim().is_empty() || c.identity_model.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "Model names must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.http_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "HTTP timeout must be ≥ 1 second".into(),
            ));
        }
        if let Some(ref endpoint) = c.analysis_endpoint {
            if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
                return Err(ExtractError::InvalidConfig(format!(
                    "Layout analysis endpoint must be an HTTP(S) URL, got '{endpoint}'"
                )));
            }
        }
        Ok(self.config)
    }
}
