//! # marksheet-extract
//!
//! Extract a student's identity and per-subject grades from an academic
//! transcript (PDF or image).
//!
//! ## Why this crate?
//!
//! Transcripts are tables with merged cells, multi-row headers and
//! board-specific grading scales. A layout service can find the cells but
//! not tell a marks table from a legend; an LLM can read a marks table but
//! will happily invent one from a sparse cell list. This crate sits in
//! between: it rebuilds each table as span-correct HTML, asks an LLM to
//! classify and read it, and refuses (rather than guesses) whenever the
//! document is ambiguous.
//!
//! ## Pipeline Overview
//!
//! ```text
//! transcript
//!  │
//!  ├─ 1. Input     resolve local file or pass a URL through
//!  ├─ 2. Analyse   layout service → pages, lines, sparse tables
//!  ├─ 3. Rebuild   dense grid per table → <table> with rowspan/colspan
//!  ├─ 4. Classify  identity ∥ which table holds the marks
//!  ├─ 5. Gates     one marks table, one grading scale
//!  └─ 6. Extract   [{subjectName, subjectGrade}], never empty
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use marksheet_extract::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // AZURE_ENDPOINT / AZURE_KEY for layout, OPENAI_API_KEY for the LLM
//!     let config = ExtractionConfig::default();
//!     let result = extract("transcript.pdf", &config).await?;
//!     for record in &result.marks {
//!         println!("{}: {}", record.subject_name, record.subject_grade);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Injecting collaborators
//!
//! [`Extractor::new`] takes any [`DocumentAnalyzer`] and
//! [`ClassificationOracle`], which is how the tests drive the gates with
//! scripted verdicts.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `marksheet` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! marksheet-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use document::{CellDescriptor, DocumentAnalysisResult, TableDescriptor};
pub use error::{Collaborator, ErrorKind, ErrorResponse, ExtractError, OracleError};
pub use extract::{extract, extract_from_analysis_file, extract_sync, reconstruct_tables, Extractor};
pub use output::{ClassifiedTable, ExtractedRecord, PipelineResult, StudentInformation};
pub use pipeline::analysis::{AzureLayoutAnalyzer, DocumentAnalyzer};
pub use pipeline::grid::{reconstruct, CellKind, ReconstructedTable, HEADER_ROWS};
pub use pipeline::input::{load_analysis, DocumentSource};
pub use pipeline::oracle::{classify_as, ClassificationOracle, LlmOracle, OracleRequest, OracleTask};
pub use pipeline::tables::collect_tables;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback, Stage};
pub use schema::{
    ExtractedOutput, IsMultipleGradingScale, OracleSchema, SchemaSpec, TableClassification,
    TableVerdict,
};
