//! Error types for the marksheet-extract library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`]: **fatal**, the request ends here. Gate rejections
//!   (ambiguous or unsupported documents), collaborator outages and setup
//!   problems all surface as `Err(ExtractError)` from the `extract*`
//!   functions. No partial [`crate::output::PipelineResult`] is ever
//!   returned alongside one.
//!
//! * [`OracleError`]: **per-attempt**, a single oracle call failed (transport
//!   error, unparseable reply). The oracle adapter retries these and only
//!   converts the last one into [`ExtractError::CollaboratorUnavailable`].
//!
//! Every fatal error maps onto a machine-readable [`ErrorKind`] so callers
//! (the CLI, an HTTP layer) can branch on the kind instead of the message.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which external collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collaborator {
    /// The layout analysis service (pages, lines, words, tables).
    DocumentAnalysis,
    /// The structured-completion LLM.
    Oracle,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collaborator::DocumentAnalysis => f.write_str("document analysis"),
            Collaborator::Oracle => f.write_str("classification oracle"),
        }
    }
}

/// All fatal errors returned by the marksheet-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Gate rejections ───────────────────────────────────────────────────
    /// More than one table was classified as a marks table.
    #[error("Document is ambiguous: {marks_tables} tables were classified as marks tables, expected at most one")]
    AmbiguousDocument { marks_tables: usize },

    /// The surviving marks table mixes grading scales, sittings or year levels.
    #[error("Unsupported layout: table {table_index} mixes grading scales or years")]
    UnsupportedLayout { table_index: usize },

    /// Classification succeeded but no subject/grade records were extracted.
    #[error("No marks could be extracted from this document")]
    ExtractionFailure,

    // ── Collaborator failures ─────────────────────────────────────────────
    /// The oracle returned a classification list of the wrong length.
    #[error("Oracle protocol violation: sent {expected} tables, received {received} classifications")]
    OracleProtocolViolation { expected: usize, received: usize },

    /// The analysis service or the oracle failed, timed out or replied with garbage.
    #[error("{collaborator} unavailable: {detail}")]
    CollaboratorUnavailable {
        collaborator: Collaborator,
        detail: String,
    },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// A saved analysis file could not be parsed.
    #[error("Analysis file '{path}' is not a layout analysis result: {detail}")]
    InvalidAnalysis { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed, or a required setting is missing.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable error kind, stable across message wording changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    AmbiguousDocument,
    UnsupportedLayout,
    ExtractionFailure,
    OracleProtocolViolation,
    CollaboratorUnavailable,
    InvalidInput,
    InvalidConfig,
    Internal,
}

impl ExtractError {
    /// Shorthand for an analysis-service failure.
    pub fn analysis(detail: impl Into<String>) -> Self {
        ExtractError::CollaboratorUnavailable {
            collaborator: Collaborator::DocumentAnalysis,
            detail: detail.into(),
        }
    }

    /// Shorthand for an oracle failure.
    pub fn oracle(detail: impl Into<String>) -> Self {
        ExtractError::CollaboratorUnavailable {
            collaborator: Collaborator::Oracle,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::AmbiguousDocument { .. } => ErrorKind::AmbiguousDocument,
            ExtractError::UnsupportedLayout { .. } => ErrorKind::UnsupportedLayout,
            ExtractError::ExtractionFailure => ErrorKind::ExtractionFailure,
            ExtractError::OracleProtocolViolation { .. } => ErrorKind::OracleProtocolViolation,
            ExtractError::CollaboratorUnavailable { .. } => ErrorKind::CollaboratorUnavailable,
            ExtractError::FileNotFound { .. }
            | ExtractError::PermissionDenied { .. }
            | ExtractError::InvalidInput { .. }
            | ExtractError::InvalidAnalysis { .. } => ErrorKind::InvalidInput,
            ExtractError::ProviderNotConfigured { .. } | ExtractError::InvalidConfig(_) => {
                ErrorKind::InvalidConfig
            }
            ExtractError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True when re-running the whole request may succeed.
    ///
    /// Gate rejections are deterministic for the same oracle verdicts and
    /// are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractError::CollaboratorUnavailable { .. })
    }

    /// True for the fail-closed gate rejections.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AmbiguousDocument | ErrorKind::UnsupportedLayout | ErrorKind::ExtractionFailure
        )
    }
}

/// A single failed oracle attempt.
///
/// Retried by the oracle adapter; never returned from the public pipeline API.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// The provider call itself failed (network, auth, rate limit).
    #[error("oracle call failed: {0}")]
    Transport(String),

    /// The provider answered, but not with a JSON object.
    #[error("oracle reply is not a JSON object: {detail}")]
    Malformed { detail: String },
}

/// The failure half of the request/response contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&ExtractError> for ErrorResponse {
    fn from(e: &ExtractError) -> Self {
        ErrorResponse {
            error: ErrorBody {
                kind: e.kind(),
                message: e.to_string(),
                retryable: e.is_retryable(),
            },
        }
    }
}
