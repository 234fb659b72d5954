//! Extraction entry points.
//!
//! [`Extractor`] owns the two collaborators and runs one request through
//! the stages:
//!
//! ```text
//! analyze ──▶ collect_tables ──┬──▶ classify tables ──▶ multi-table gate ──▶ grading-scale gate ──▶ extract marks ──▶ aggregation gate
//!            content ──────────┴──▶ identity ───────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Identity extraction and table classification are independent and run
//! concurrently. Every gate returns `Err` on rejection; nothing is
//! observable until the final [`PipelineResult`] is assembled, so dropping
//! the future mid-way leaves no partial result behind.
//!
//! The free functions ([`extract`], [`extract_sync`],
//! [`extract_from_analysis_file`], [`reconstruct_tables`]) build the
//! adapters from an [`ExtractionConfig`] for callers that do not inject
//! their own.

use crate::config::ExtractionConfig;
use crate::document::DocumentAnalysisResult;
use crate::error::ExtractError;
use crate::output::{PipelineResult, StudentInformation};
use crate::pipeline::analysis::{AzureLayoutAnalyzer, DocumentAnalyzer};
use crate::pipeline::grid::ReconstructedTable;
use crate::pipeline::input::{self, DocumentSource};
use crate::pipeline::oracle::{classify_as, ClassificationOracle, LlmOracle, OracleTask};
use crate::pipeline::{gates, tables};
use crate::progress::{ProgressCallback, Stage};
use crate::schema::{ExtractedOutput, IsMultipleGradingScale, OracleSchema, TableClassification};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs transcripts through analysis, classification and the gates.
///
/// Collaborators are injected once and shared read-only; one `Extractor`
/// can serve any number of concurrent requests.
pub struct Extractor {
    analyzer: Arc<dyn DocumentAnalyzer>,
    oracle: Arc<dyn ClassificationOracle>,
    progress: Option<ProgressCallback>,
}

impl Extractor {
    pub fn new(analyzer: Arc<dyn DocumentAnalyzer>, oracle: Arc<dyn ClassificationOracle>) -> Self {
        Self {
            analyzer,
            oracle,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Build the layout-service and LLM adapters from `config`.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let analyzer = AzureLayoutAnalyzer::from_config(config)?;
        let oracle = LlmOracle::from_config(config)?;
        Ok(Self {
            analyzer: Arc::new(analyzer),
            oracle: Arc::new(oracle),
            progress: config.progress_callback.clone(),
        })
    }

    /// Analyse `source` and extract its transcript.
    pub async fn extract(&self, source: &DocumentSource) -> Result<PipelineResult, ExtractError> {
        let analysis = self
            .stage(Stage::Analysis, self.analyzer.analyze(source))
            .await
            .map_err(|e| self.rejected(e))?;
        self.extract_from_analysis(&analysis).await
    }

    /// Extract a transcript from an already analysed document.
    pub async fn extract_from_analysis(
        &self,
        analysis: &DocumentAnalysisResult,
    ) -> Result<PipelineResult, ExtractError> {
        let start = Instant::now();
        match self.run(analysis).await {
            Ok(result) => {
                info!(
                    "Extracted {} marks for '{}' in {:?}",
                    result.marks.len(),
                    result.student_information.name,
                    start.elapsed()
                );
                if let Some(ref cb) = self.progress {
                    cb.on_pipeline_complete(result.marks.len());
                }
                Ok(result)
            }
            Err(e) => Err(self.rejected(e)),
        }
    }

    async fn run(&self, analysis: &DocumentAnalysisResult) -> Result<PipelineResult, ExtractError> {
        let tables = tables::collect_tables(analysis);
        debug!("Reconstructed {} tables", tables.len());

        // ── Stages 1 + 2: identity and classification ────────────────────
        let (student_information, classification) = futures::try_join!(
            self.identify(&analysis.content),
            self.classify_tables(&tables)
        )?;
        let classified = gates::pair_verdicts(&tables, classification)?;

        // ── Stage 3: multi-table gate ────────────────────────────────────
        let mut marks = Vec::new();
        if let Some(index) = gates::marks_table_index(&classified)? {
            let content = classified[index].table_content.as_str();

            // ── Stage 4: grading-scale gate ──────────────────────────────
            let verdict: IsMultipleGradingScale =
                self.ask(OracleTask::GradingScale, content).await?;
            gates::check_grading_scale(index, verdict.is_multiple_grading_scale)?;

            // ── Stage 5: field extraction ────────────────────────────────
            let extracted: ExtractedOutput = self.ask(OracleTask::MarksExtraction, content).await?;
            debug!("Table {} yielded {} records", index, extracted.subjects.len());
            marks.extend(extracted.subjects);
        } else {
            debug!("No table was classified as a marks table");
        }

        // ── Stage 6: aggregation gate ────────────────────────────────────
        let marks = gates::ensure_marks(marks)?;

        Ok(PipelineResult {
            student_information,
            marks,
        })
    }

    async fn identify(&self, content: &str) -> Result<StudentInformation, ExtractError> {
        self.ask(OracleTask::Identity, content).await
    }

    async fn classify_tables(
        &self,
        tables: &[ReconstructedTable],
    ) -> Result<TableClassification, ExtractError> {
        if tables.is_empty() {
            return Ok(TableClassification { tables: Vec::new() });
        }
        let input = gates::classification_input(tables);
        self.ask(OracleTask::TableClassification, &input).await
    }

    /// One oracle call, reported under the task's stage.
    async fn ask<T: OracleSchema>(&self, task: OracleTask, input: &str) -> Result<T, ExtractError> {
        self.stage(task.stage(), classify_as(self.oracle.as_ref(), task, input))
            .await
    }

    /// Run `fut` between start and complete events for `stage`.
    async fn stage<T, F>(&self, stage: Stage, fut: F) -> Result<T, ExtractError>
    where
        F: Future<Output = Result<T, ExtractError>>,
    {
        if let Some(ref cb) = self.progress {
            cb.on_stage_start(stage);
        }
        let out = fut.await?;
        if let Some(ref cb) = self.progress {
            cb.on_stage_complete(stage);
        }
        Ok(out)
    }

    fn rejected(&self, e: ExtractError) -> ExtractError {
        warn!("Extraction ended: {}", e);
        if let Some(ref cb) = self.progress {
            cb.on_rejected(e.kind());
        }
        e
    }
}

/// Extract a transcript from a local file or URL.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Input problems are reported before any collaborator is contacted; gate
/// rejections and collaborator failures as described on [`ExtractError`].
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<PipelineResult, ExtractError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    let source = input::resolve_input(input_str).await?;
    let extractor = Extractor::from_config(config)?;
    extractor.extract(&source).await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a new tokio runtime internally; do not call from inside one.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<PipelineResult, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, config))
}

/// Extract a transcript from a saved layout analysis (JSON).
///
/// Only the oracle is contacted; no layout-service credentials are needed.
pub async fn extract_from_analysis_file(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<PipelineResult, ExtractError> {
    let path = path.as_ref();
    info!("Starting extraction from saved analysis: {}", path.display());

    let analysis = Arc::new(input::load_analysis(path).await?);
    let oracle = LlmOracle::from_config(config)?;
    let mut extractor = Extractor::new(analysis.clone(), Arc::new(oracle));
    extractor.progress = config.progress_callback.clone();
    extractor.extract_from_analysis(&analysis).await
}

/// Analyse a document and return its reconstructed tables, without
/// classification. Needs layout-service credentials but no LLM.
pub async fn reconstruct_tables(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<Vec<ReconstructedTable>, ExtractError> {
    let source = input::resolve_input(input_str.as_ref()).await?;
    let analyzer = AzureLayoutAnalyzer::from_config(config)?;
    let analysis = analyzer.analyze(&source).await?;
    Ok(tables::collect_tables(&analysis))
}
