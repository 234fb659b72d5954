//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to be told
//! when each stage starts and finishes, and when a gate rejects the
//! document. A single extraction spends most of its wall-clock time waiting
//! on the oracle, so even a spinner that names the current stage is a
//! large usability win for the CLI.
//!
//! # Example
//!
//! ```rust
//! use marksheet_extract::{ExtractionConfig, PipelineProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct PrintStages;
//!
//! impl PipelineProgressCallback for PrintStages {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(PrintStages) as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ErrorKind;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A pipeline stage that reports progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Layout analysis of the source document.
    Analysis,
    IdentityExtraction,
    TableClassification,
    /// Mixed grading-scale check of the surviving marks table.
    AmbiguityCheck,
    FieldExtraction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Analysis => "analysing layout",
            Stage::IdentityExtraction => "extracting student information",
            Stage::TableClassification => "classifying tables",
            Stage::AmbiguityCheck => "checking grading scales",
            Stage::FieldExtraction => "extracting marks",
        };
        f.write_str(s)
    }
}

/// Called by the pipeline as it moves through its stages.
///
/// Identity extraction and table classification run concurrently, so their
/// events may interleave. All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// A gate or collaborator ended the request.
    fn on_rejected(&self, kind: ErrorKind) {
        let _ = kind;
    }

    /// Called once on success with the number of extracted records.
    fn on_pipeline_complete(&self, marks: usize) {
        let _ = marks;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl PipelineProgressCallback for Recorder {
        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start {stage:?}"));
        }

        fn on_stage_complete(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("done {stage:?}"));
        }

        fn on_rejected(&self, kind: ErrorKind) {
            self.events.lock().unwrap().push(format!("rejected {kind:?}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Analysis);
        cb.on_stage_complete(Stage::Analysis);
        cb.on_rejected(ErrorKind::ExtractionFailure);
        cb.on_pipeline_complete(3);
    }

    #[test]
    fn recorder_receives_events_through_arc_dyn() {
        let recorder = Arc::new(Recorder::default());
        let cb: ProgressCallback = recorder.clone();
        cb.on_stage_start(Stage::AmbiguityCheck);
        cb.on_rejected(ErrorKind::UnsupportedLayout);
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["start AmbiguityCheck", "rejected UnsupportedLayout"]
        );
    }

    #[test]
    fn stage_display_is_human_readable() {
        assert_eq!(Stage::FieldExtraction.to_string(), "extracting marks");
    }
}
