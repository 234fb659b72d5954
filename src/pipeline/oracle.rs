//! Classification oracle: instruction + input + schema → structured object.
//!
//! The pipeline only depends on the [`ClassificationOracle`] trait and the
//! typed front door [`classify_as`]. The shipped implementation,
//! [`LlmOracle`], turns any `edgequake_llm` chat provider into an oracle by
//! appending the schema to the system message and parsing the reply as JSON.
//!
//! ## Retry Strategy
//!
//! Transport errors (429, 5xx, timeouts) and replies that are not a JSON
//! object are retried with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`): 500 ms → 1 s with the defaults.
//! A reply that *is* JSON but does not match the schema is not retried here;
//! it surfaces from [`classify_as`] as a collaborator failure.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, OracleError};
use crate::progress::Stage;
use crate::prompts::{
    schema_instruction, IDENTITY_PROMPT, MARKS_EXTRACTION_PROMPT, MULTIPLE_GRADING_SCALE_PROMPT,
    TABLE_CLASSIFICATION_PROMPT,
};
use crate::schema::{OracleSchema, SchemaSpec};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// The four things the pipeline asks the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OracleTask {
    Identity,
    TableClassification,
    GradingScale,
    MarksExtraction,
}

impl OracleTask {
    /// Built-in system instruction for the task.
    pub fn instruction(self) -> &'static str {
        match self {
            OracleTask::Identity => IDENTITY_PROMPT,
            OracleTask::TableClassification => TABLE_CLASSIFICATION_PROMPT,
            OracleTask::GradingScale => MULTIPLE_GRADING_SCALE_PROMPT,
            OracleTask::MarksExtraction => MARKS_EXTRACTION_PROMPT,
        }
    }

    pub fn stage(self) -> Stage {
        match self {
            OracleTask::Identity => Stage::IdentityExtraction,
            OracleTask::TableClassification => Stage::TableClassification,
            OracleTask::GradingScale => Stage::AmbiguityCheck,
            OracleTask::MarksExtraction => Stage::FieldExtraction,
        }
    }
}

/// One oracle invocation.
#[derive(Debug, Clone)]
pub struct OracleRequest<'a> {
    pub task: OracleTask,
    pub instruction: &'a str,
    pub input: &'a str,
    pub schema: SchemaSpec,
}

/// Returns a JSON object conforming to `request.schema`, or fails.
#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    async fn classify(&self, request: &OracleRequest<'_>) -> Result<Value, OracleError>;
}

/// Ask `oracle` for a `T` and deserialize the reply.
pub async fn classify_as<T: OracleSchema>(
    oracle: &dyn ClassificationOracle,
    task: OracleTask,
    input: &str,
) -> Result<T, ExtractError> {
    let request = OracleRequest {
        task,
        instruction: task.instruction(),
        input,
        schema: SchemaSpec::of::<T>(),
    };

    let value = oracle
        .classify(&request)
        .await
        .map_err(|e| ExtractError::oracle(format!("{}: {}", T::NAME, e)))?;

    serde_json::from_value(value).map_err(|e| {
        ExtractError::oracle(format!("{} reply does not match its schema: {}", T::NAME, e))
    })
}

/// Oracle backed by `edgequake_llm` chat providers.
///
/// Identity extraction reads plain text and runs on its own (cheaper)
/// provider; the three table tasks share the classification provider.
pub struct LlmOracle {
    classifier: Arc<dyn LLMProvider>,
    identity: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl LlmOracle {
    /// One provider for every task, default generation settings.
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        let defaults = ExtractionConfig::default();
        Self {
            classifier: Arc::clone(&provider),
            identity: provider,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            max_retries: defaults.max_retries,
            retry_backoff_ms: defaults.retry_backoff_ms,
        }
    }

    pub fn with_identity_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.identity = provider;
        self
    }

    /// Resolve providers from config and environment.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let (classifier, identity) = resolve_providers(config)?;
        Ok(Self {
            classifier,
            identity,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ClassificationOracle for LlmOracle {
    async fn classify(&self, request: &OracleRequest<'_>) -> Result<Value, OracleError> {
        let start = Instant::now();
        let provider = match request.task {
            OracleTask::Identity => &self.identity,
            _ => &self.classifier,
        };

        let system = format!(
            "{}{}",
            request.instruction,
            schema_instruction(&request.schema)
        );
        let messages = vec![ChatMessage::system(system), ChatMessage::user(request.input)];
        let options = self.options();

        let mut last_err: Option<OracleError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    request.schema.name, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        request.schema.name,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    match parse_reply(&response.content) {
                        Ok(value) => return Ok(value),
                        Err(e) => {
                            warn!("{}: attempt {} unusable: {}", request.schema.name, attempt + 1, e);
                            last_err = Some(e);
                        }
                    }
                }
                Err(e) => {
                    let err = OracleError::Transport(e.to_string());
                    warn!("{}: attempt {} failed: {}", request.schema.name, attempt + 1, err);
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| OracleError::Transport("Unknown error".to_string())))
    }
}

static RE_FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?[ \t]*\n(.*?)\n?```\s*$").unwrap());

/// Extract the JSON object from a chat reply.
///
/// Models sometimes wrap the object in a code fence or add a sentence
/// around it despite the instruction; both are tolerated. Anything that
/// does not contain a JSON object is [`OracleError::Malformed`].
pub fn parse_reply(content: &str) -> Result<Value, OracleError> {
    let trimmed = content.trim();
    let unfenced = match RE_FENCED_JSON.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    };

    let candidate = match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => {
            return Err(OracleError::Malformed {
                detail: "no JSON object in reply".to_string(),
            })
        }
    };

    let value: Value = serde_json::from_str(candidate).map_err(|e| OracleError::Malformed {
        detail: e.to_string(),
    })?;

    if value.is_object() {
        Ok(value)
    } else {
        Err(OracleError::Malformed {
            detail: "reply is JSON but not an object".to_string(),
        })
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve `(classifier, identity)` providers, most specific first:
///
/// 1. A pre-built provider in the config serves every task.
/// 2. A named provider is instantiated once per model.
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` pin one provider and model
///    for every task.
/// 4. An `OPENAI_API_KEY` selects OpenAI with the configured models.
/// 5. Otherwise the factory auto-detects from the environment.
fn resolve_providers(
    config: &ExtractionConfig,
) -> Result<(Arc<dyn LLMProvider>, Arc<dyn LLMProvider>), ExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok((Arc::clone(provider), Arc::clone(provider)));
    }

    if let Some(ref name) = config.provider_name {
        return Ok((
            create_provider(name, &config.model)?,
            create_provider(name, &config.identity_model)?,
        ));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            let provider = create_provider(&prov, &model)?;
            return Ok((Arc::clone(&provider), provider));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return Ok((
                create_provider("openai", &config.model)?,
                create_provider("openai", &config.identity_model)?,
            ));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok((Arc::clone(&llm_provider), llm_provider))
}
