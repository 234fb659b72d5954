//! Layout analysis: the collaborator that turns a document into pages,
//! lines, words and sparse tables.
//!
//! The pipeline only depends on the [`DocumentAnalyzer`] trait. The shipped
//! implementation, [`AzureLayoutAnalyzer`], drives the Azure Document
//! Intelligence `prebuilt-layout` REST API:
//!
//! ```text
//! POST {endpoint}/documentintelligence/documentModels/{model}:analyze  ──▶ 202 + Operation-Location
//! GET  Operation-Location   (repeat until status = succeeded | failed)  ──▶ analyzeResult
//! ```
//!
//! The service is asynchronous on its side, so a single analysis is one
//! submit plus a bounded number of polls. Every failure along the way is a
//! [`crate::error::ExtractError::CollaboratorUnavailable`]; the caller may
//! retry the whole request.

use crate::config::ExtractionConfig;
use crate::document::DocumentAnalysisResult;
use crate::error::ExtractError;
use crate::pipeline::input::DocumentSource;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Turns a document into its typed layout.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn analyze(&self, source: &DocumentSource) -> Result<DocumentAnalysisResult, ExtractError>;
}

/// A finished analysis replays itself for any source. Used for saved
/// analysis files and as a test double.
#[async_trait]
impl DocumentAnalyzer for DocumentAnalysisResult {
    async fn analyze(&self, _source: &DocumentSource) -> Result<DocumentAnalysisResult, ExtractError> {
        Ok(self.clone())
    }
}

/// Analyzer backed by the Azure Document Intelligence layout model.
pub struct AzureLayoutAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    key: String,
    api_version: String,
    model: String,
    poll_interval: Duration,
    max_polls: u32,
    timeout_secs: u64,
}

impl std::fmt::Debug for AzureLayoutAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureLayoutAnalyzer")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("model", &self.model)
            .field("poll_interval", &self.poll_interval)
            .field("max_polls", &self.max_polls)
            .finish()
    }
}

impl AzureLayoutAnalyzer {
    /// Build from config, reading credentials from the environment if the
    /// config does not carry them.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let (endpoint, key) = config.analysis_credentials()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            key,
            api_version: config.analysis_api_version.clone(),
            model: config.analysis_model.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls,
            timeout_secs: config.http_timeout_secs,
        })
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            self.endpoint, self.model, self.api_version
        )
    }

    fn transport_error(&self, action: &str, e: reqwest::Error) -> ExtractError {
        if e.is_timeout() {
            ExtractError::analysis(format!("{action} timed out after {}s", self.timeout_secs))
        } else {
            ExtractError::analysis(format!("{action} failed: {e}"))
        }
    }

    /// Submit the document and return the operation URL to poll.
    async fn submit(&self, source: &DocumentSource) -> Result<String, ExtractError> {
        let body = AnalyzeRequest::from_source(source);
        let response = self
            .client
            .post(self.analyze_url())
            .header(KEY_HEADER, &self.key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error("submitting document", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ExtractError::analysis(format!(
                "HTTP {} submitting document: {}",
                status,
                truncate(&text, 300)
            )));
        }

        response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ExtractError::analysis("response carried no Operation-Location header"))
    }

    /// Poll the operation until it reaches a terminal state.
    async fn poll(&self, operation_url: &str) -> Result<DocumentAnalysisResult, ExtractError> {
        for attempt in 1..=self.max_polls {
            let response = self
                .client
                .get(operation_url)
                .header(KEY_HEADER, &self.key)
                .send()
                .await
                .map_err(|e| self.transport_error("polling analysis", e))?;

            let delay = retry_after(response.headers()).unwrap_or(self.poll_interval);
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ExtractError::analysis(format!(
                    "HTTP {} polling analysis: {}",
                    status,
                    truncate(&text, 300)
                )));
            }

            let operation: OperationStatus = response
                .json()
                .await
                .map_err(|e| ExtractError::analysis(format!("unreadable analysis status: {e}")))?;

            if let Some(result) = operation.into_outcome()? {
                return Ok(result);
            }
            debug!("Analysis still running (poll {}/{})", attempt, self.max_polls);
            sleep(delay).await;
        }

        Err(ExtractError::analysis(format!(
            "analysis did not finish after {} polls",
            self.max_polls
        )))
    }
}

#[async_trait]
impl DocumentAnalyzer for AzureLayoutAnalyzer {
    async fn analyze(&self, source: &DocumentSource) -> Result<DocumentAnalysisResult, ExtractError> {
        info!("Submitting document for layout analysis: {:?}", source);
        let operation_url = self.submit(source).await?;
        let result = self.poll(&operation_url).await?;
        info!(
            "Layout analysis complete: {} pages, {} tables",
            result.pages.len(),
            result.tables.len()
        );
        Ok(result)
    }
}

/// Request body: exactly one of the two sources is set.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    url_source: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base64_source: Option<String>,
}

impl<'a> AnalyzeRequest<'a> {
    fn from_source(source: &'a DocumentSource) -> Self {
        match source {
            DocumentSource::Url(url) => Self {
                url_source: Some(url),
                base64_source: None,
            },
            DocumentSource::Bytes(bytes) => Self {
                url_source: None,
                base64_source: Some(STANDARD.encode(bytes)),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationStatus {
    status: String,
    #[serde(default)]
    analyze_result: Option<DocumentAnalysisResult>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl OperationStatus {
    /// `Ok(Some)` when done, `Ok(None)` while running, `Err` on failure.
    fn into_outcome(self) -> Result<Option<DocumentAnalysisResult>, ExtractError> {
        match self.status.as_str() {
            "succeeded" => self
                .analyze_result
                .map(Some)
                .ok_or_else(|| ExtractError::analysis("analysis succeeded without a result")),
            "failed" | "canceled" => {
                let err = self.error.unwrap_or_default();
                Err(ExtractError::analysis(format!(
                    "analysis {}: {} {}",
                    self.status, err.code, err.message
                )))
            }
            _ => Ok(None),
        }
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
