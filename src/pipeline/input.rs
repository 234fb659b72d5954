//! Input resolution: normalise a user-supplied path or URL to a
//! [`DocumentSource`] the layout service accepts.
//!
//! URLs are passed through untouched; the service fetches them itself, so
//! we never download transcripts onto local disk. Local files are read into
//! memory and sent inline. Saved analysis results (JSON) skip the service
//! entirely via [`load_analysis`].

use crate::document::DocumentAnalysisResult;
use crate::error::ExtractError;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What gets sent to the layout service.
#[derive(Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// A URL the service can retrieve.
    Url(String),
    /// Raw document bytes (PDF, image, ...).
    Bytes(Vec<u8>),
}

impl std::fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentSource::Url(url) => f.debug_tuple("Url").field(url).finish(),
            DocumentSource::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a document source.
///
/// URLs are validated syntactically; local files must exist and be readable.
pub async fn resolve_input(input: &str) -> Result<DocumentSource, ExtractError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ExtractError::InvalidInput {
            input: input.to_string(),
        });
    }

    if is_url(input) {
        reqwest::Url::parse(input).map_err(|_| ExtractError::InvalidInput {
            input: input.to_string(),
        })?;
        debug!("Resolved URL source: {}", input);
        return Ok(DocumentSource::Url(input.to_string()));
    }

    let bytes = read_local(Path::new(input)).await?;
    debug!("Resolved local source: {} ({} bytes)", input, bytes.len());
    Ok(DocumentSource::Bytes(bytes))
}

async fn read_local(path: &Path) -> Result<Vec<u8>, ExtractError> {
    let path_buf = path.to_path_buf();
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ExtractError::PermissionDenied { path: path_buf })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExtractError::FileNotFound { path: path_buf })
        }
        Err(_) if path.is_dir() => Err(ExtractError::InvalidInput {
            input: path.display().to_string(),
        }),
        Err(_) => Err(ExtractError::FileNotFound { path: path_buf }),
    }
}

/// Top-level keys of a bare analysis result; a saved file must carry at
/// least one of them.
const RESULT_KEYS: [&str; 3] = ["content", "pages", "tables"];

/// Load a previously saved layout analysis from disk.
///
/// Accepts either the bare result or the full operation envelope the
/// service returns when polled. An envelope must have succeeded.
pub async fn load_analysis(path: impl AsRef<Path>) -> Result<DocumentAnalysisResult, ExtractError> {
    let path = path.as_ref();
    let bytes = read_local(path).await?;
    parse_analysis(&bytes, path)
}

fn parse_analysis(bytes: &[u8], path: &Path) -> Result<DocumentAnalysisResult, ExtractError> {
    let invalid = |detail: String| ExtractError::InvalidAnalysis {
        path: PathBuf::from(path),
        detail,
    };

    let value: Value = serde_json::from_slice(bytes).map_err(|e| invalid(e.to_string()))?;
    let mut object = match value {
        Value::Object(map) => map,
        _ => return Err(invalid("expected a JSON object".to_string())),
    };

    let result = if object.contains_key("status") || object.contains_key("analyzeResult") {
        let status = object.get("status").and_then(Value::as_str).unwrap_or_default();
        if status != "succeeded" {
            let code = object
                .get("error")
                .and_then(|e| e.get("code"))
                .and_then(Value::as_str)
                .map(|code| format!(" ({code})"))
                .unwrap_or_default();
            return Err(invalid(format!("saved operation has status '{status}'{code}")));
        }
        object
            .remove("analyzeResult")
            .ok_or_else(|| invalid("succeeded operation without analyzeResult".to_string()))?
    } else if RESULT_KEYS.iter().any(|key| object.contains_key(*key)) {
        Value::Object(object)
    } else {
        return Err(invalid(format!(
            "expected an analysis result ({}) or an operation envelope",
            RESULT_KEYS.join(", ")
        )));
    };

    debug!("Loaded saved analysis from {}", path.display());
    serde_json::from_value(result).map_err(|e| invalid(e.to_string()))
}
