//! Pipeline integration tests with scripted collaborators.
//!
//! No network: the analyzer is a fixed `DocumentAnalysisResult` and the
//! oracle replays canned JSON per task while recording what it was asked.
//!
//! Run with:
//!   cargo test --test pipeline

use async_trait::async_trait;
use marksheet_extract::{
    classify_as, collect_tables, load_analysis, CellDescriptor, ClassificationOracle,
    DocumentAnalysisResult, DocumentSource, ErrorKind, ExtractError, ExtractedOutput,
    ExtractedRecord, Extractor, IsMultipleGradingScale, OracleError, OracleRequest, OracleTask,
    PipelineProgressCallback, PipelineResult, Stage, TableClassification, TableDescriptor,
    TableVerdict,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Replays one canned reply per task and logs every request.
#[derive(Default)]
struct ScriptedOracle {
    replies: HashMap<OracleTask, Result<Value, OracleError>>,
    calls: Mutex<Vec<(OracleTask, String)>>,
}

impl ScriptedOracle {
    fn reply(mut self, task: OracleTask, value: Value) -> Self {
        self.replies.insert(task, Ok(value));
        self
    }

    fn fail(mut self, task: OracleTask, error: OracleError) -> Self {
        self.replies.insert(task, Err(error));
        self
    }

    fn tasks(&self) -> Vec<OracleTask> {
        self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    fn input_for(&self, task: OracleTask) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(t, _)| *t == task)
            .map(|(_, input)| input.clone())
    }
}

#[async_trait]
impl ClassificationOracle for ScriptedOracle {
    async fn classify(&self, request: &OracleRequest<'_>) -> Result<Value, OracleError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.task, request.input.to_string()));
        self.replies
            .get(&request.task)
            .cloned()
            .unwrap_or_else(|| panic!("no scripted reply for {:?}", request.task))
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl PipelineProgressCallback for Recorder {
    fn on_stage_complete(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("done {stage:?}"));
    }

    fn on_rejected(&self, kind: ErrorKind) {
        self.events.lock().unwrap().push(format!("rejected {kind:?}"));
    }

    fn on_pipeline_complete(&self, marks: usize) {
        self.events.lock().unwrap().push(format!("complete {marks}"));
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn identity() -> Value {
    json!({
        "name": "Jane Doe",
        "board": "CBSE",
        "school": "Springfield High",
        "city": "Pune",
        "country": "India"
    })
}

fn labelled_table(label: &str) -> TableDescriptor {
    TableDescriptor::new(3, 2)
        .with_cell(CellDescriptor::new(0, 0, label).spanning(1, 2))
        .with_cell(CellDescriptor::new(1, 0, "Subject"))
        .with_cell(CellDescriptor::new(1, 1, "Grade"))
        .with_cell(CellDescriptor::new(2, 0, "Math"))
        .with_cell(CellDescriptor::new(2, 1, "A"))
}

fn analysis(tables: Vec<TableDescriptor>) -> DocumentAnalysisResult {
    DocumentAnalysisResult {
        content: "Jane Doe\nSpringfield High, Pune".to_string(),
        tables,
        ..Default::default()
    }
}

fn verdicts(flags: &[bool]) -> Value {
    let tables: Vec<Value> = flags
        .iter()
        .map(|f| json!({"tableContent": "…", "isMarksTable": f}))
        .collect();
    json!({ "tables": tables })
}

fn run(
    oracle: Arc<ScriptedOracle>,
    doc: DocumentAnalysisResult,
) -> Result<PipelineResult, ExtractError> {
    let extractor = Extractor::new(Arc::new(doc.clone()), oracle);
    tokio_test::block_on(extractor.extract_from_analysis(&doc))
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn two_marks_tables_are_ambiguous_before_extraction() {
    let oracle = Arc::new(
        ScriptedOracle::default()
            .reply(OracleTask::Identity, identity())
            .reply(OracleTask::TableClassification, verdicts(&[true, true])),
    );

    let err = run(
        oracle.clone(),
        analysis(vec![labelled_table("Term 1"), labelled_table("Term 2")]),
    )
    .unwrap_err();

    assert!(matches!(err, ExtractError::AmbiguousDocument { marks_tables: 2 }));
    let tasks = oracle.tasks();
    assert!(!tasks.contains(&OracleTask::GradingScale));
    assert!(!tasks.contains(&OracleTask::MarksExtraction));
}

#[test]
fn mixed_grading_scale_is_unsupported_and_skips_extraction() {
    let oracle = Arc::new(
        ScriptedOracle::default()
            .reply(OracleTask::Identity, identity())
            .reply(OracleTask::TableClassification, verdicts(&[true]))
            .reply(OracleTask::GradingScale, json!({"isMultipleGradingScale": true})),
    );

    let err = run(oracle.clone(), analysis(vec![labelled_table("Results")])).unwrap_err();

    assert!(matches!(err, ExtractError::UnsupportedLayout { table_index: 0 }));
    assert!(!oracle.tasks().contains(&OracleTask::MarksExtraction));
}

#[test]
fn empty_extraction_fails_closed() {
    let oracle = Arc::new(
        ScriptedOracle::default()
            .reply(OracleTask::Identity, identity())
            .reply(OracleTask::TableClassification, verdicts(&[true]))
            .reply(OracleTask::GradingScale, json!({"isMultipleGradingScale": false}))
            .reply(OracleTask::MarksExtraction, json!({"subjects": []})),
    );

    let err = run(oracle, analysis(vec![labelled_table("Results")])).unwrap_err();
    assert!(matches!(err, ExtractError::ExtractionFailure));
    assert!(err.is_rejection());
}

#[test]
fn single_marks_table_yields_records() {
    let oracle = Arc::new(
        ScriptedOracle::default()
            .reply(OracleTask::Identity, identity())
            .reply(OracleTask::TableClassification, verdicts(&[true]))
            .reply(OracleTask::GradingScale, json!({"isMultipleGradingScale": false}))
            .reply(
                OracleTask::MarksExtraction,
                json!({"subjects": [{"subjectName": "Math", "subjectGrade": "A"}]}),
            ),
    );

    let result = run(oracle, analysis(vec![labelled_table("Results")])).unwrap();

    assert_eq!(result.marks, vec![ExtractedRecord::new("Math", "A")]);
    assert_eq!(result.student_information.name, "Jane Doe");
    assert_eq!(result.student_information.country, "India");
}

#[test]
fn marks_table_is_chosen_by_position() {
    let oracle = Arc::new(
        ScriptedOracle::default()
            .reply(OracleTask::Identity, identity())
            .reply(OracleTask::TableClassification, verdicts(&[false, true, false]))
            .reply(OracleTask::GradingScale, json!({"isMultipleGradingScale": false}))
            .reply(
                OracleTask::MarksExtraction,
                json!({"subjects": [
                    {"subjectName": "Physics", "subjectGrade": "91"},
                    {"subjectName": "Chemistry", "subjectGrade": "88"}
                ]}),
            ),
    );
    let doc = analysis(vec![
        labelled_table("Legend"),
        labelled_table("Marks"),
        labelled_table("Attendance"),
    ]);
    let expected_html = collect_tables(&doc)[1].html().to_string();

    let result = run(oracle.clone(), doc).unwrap();

    // Records keep the oracle's order.
    assert_eq!(
        result.marks,
        vec![
            ExtractedRecord::new("Physics", "91"),
            ExtractedRecord::new("Chemistry", "88"),
        ]
    );
    // Both table stages saw the second table's own markup.
    assert_eq!(oracle.input_for(OracleTask::GradingScale).unwrap(), expected_html);
    assert_eq!(oracle.input_for(OracleTask::MarksExtraction).unwrap(), expected_html);
}

#[test]
fn classification_input_preserves_document_order() {
    let oracle = Arc::new(
        ScriptedOracle::default()
            .reply(OracleTask::Identity, identity())
            .reply(OracleTask::TableClassification, verdicts(&[false, false])),
    );

    let _ = run(
        oracle.clone(),
        analysis(vec![labelled_table("FIRST"), labelled_table("SECOND")]),
    );

    let input: Value =
        serde_json::from_str(&oracle.input_for(OracleTask::TableClassification).unwrap()).unwrap();
    let items = input.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items[0]["tableContent"].as_str().unwrap().contains("FIRST"));
    assert!(items[1]["tableContent"].as_str().unwrap().contains("SECOND"));
}

#[test]
fn identity_reads_full_document_text() {
    let oracle = Arc::new(
        ScriptedOracle::default()
            .reply(OracleTask::Identity, identity())
            .reply(OracleTask::TableClassification, verdicts(&[false])),
    );
    let doc = analysis(vec![labelled_table("x")]);
    let _ = run(oracle.clone(), doc.clone());
    assert_eq!(oracle.input_for(OracleTask::Identity).unwrap(), doc.content);
}

#[test]
fn verdict_count_mismatch_is_a_protocol_violation() {
    let oracle = Arc::new(
        ScriptedOracle::default()
            .reply(OracleTask::Identity, identity())
            .reply(OracleTask::TableClassification, verdicts(&[true])),
    );

    let err = run(oracle, analysis(vec![labelled_table("a"), labelled_table("b")])).unwrap_err();
    assert!(matches!(
        err,
        ExtractError::OracleProtocolViolation {
            expected: 2,
            received: 1
        }
    ));
    assert!(!err.is_retryable());
}

#[test]
fn no_marks_table_fails_the_aggregation_gate() {
    let oracle = Arc::new(
        ScriptedOracle::default()
            .reply(OracleTask::Identity, identity())
            .reply(OracleTask::TableClassification, verdicts(&[false])),
    );
    let err = run(oracle, analysis(vec![labelled_table("Legend")])).unwrap_err();
    assert!(matches!(err, ExtractError::ExtractionFailure));
}

#[test]
fn zero_tables_skip_classification() {
    let oracle = Arc::new(ScriptedOracle::default().reply(OracleTask::Identity, identity()));
    let err = run(oracle.clone(), analysis(vec![])).unwrap_err();
    assert!(matches!(err, ExtractError::ExtractionFailure));
    assert_eq!(oracle.tasks(), vec![OracleTask::Identity]);
}

#[test]
fn oracle_outage_surfaces_as_collaborator_unavailable() {
    let oracle = Arc::new(
        ScriptedOracle::default()
            .reply(OracleTask::Identity, identity())
            .fail(
                OracleTask::TableClassification,
                OracleError::Transport("HTTP 503".into()),
            ),
    );
    let err = run(oracle, analysis(vec![labelled_table("x")])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CollaboratorUnavailable);
    assert!(err.is_retryable());
}

#[test]
fn malformed_reply_surfaces_as_collaborator_unavailable() {
    // Every downstream reply is valid, so only the identity payload can fail.
    for reply in [
        json!({"name": "Jane Doe"}),
        json!({"tables": []}),
        json!({"unexpected": true, "name": 7}),
    ] {
        let oracle = Arc::new(
            ScriptedOracle::default()
                .reply(OracleTask::Identity, reply.clone())
                .reply(OracleTask::TableClassification, verdicts(&[true]))
                .reply(OracleTask::GradingScale, json!({"isMultipleGradingScale": false}))
                .reply(
                    OracleTask::MarksExtraction,
                    json!({"subjects": [{"subjectName": "Art", "subjectGrade": "B+"}]}),
                ),
        );
        let err = run(oracle, analysis(vec![labelled_table("x")])).unwrap_err();
        assert!(
            matches!(err, ExtractError::CollaboratorUnavailable { .. }),
            "{reply} gave {err:?}"
        );
    }
}

#[test]
fn identical_verdicts_give_identical_outcomes() {
    let script = || {
        Arc::new(
            ScriptedOracle::default()
                .reply(OracleTask::Identity, identity())
                .reply(OracleTask::TableClassification, verdicts(&[true, false]))
                .reply(OracleTask::GradingScale, json!({"isMultipleGradingScale": false}))
                .reply(
                    OracleTask::MarksExtraction,
                    json!({"subjects": [{"subjectName": "Art", "subjectGrade": "B+"}]}),
                ),
        )
    };
    let doc = analysis(vec![labelled_table("Marks"), labelled_table("Key")]);

    let first = run(script(), doc.clone()).unwrap();
    let second = run(script(), doc).unwrap();
    assert_eq!(first, second);
}

// ── Progress & entry points ─────────────────────────────────────────────────

#[test]
fn progress_reports_stages_and_rejection() {
    let oracle = Arc::new(
        ScriptedOracle::default()
            .reply(OracleTask::Identity, identity())
            .reply(OracleTask::TableClassification, verdicts(&[true]))
            .reply(OracleTask::GradingScale, json!({"isMultipleGradingScale": true})),
    );
    let recorder = Arc::new(Recorder::default());
    let doc = analysis(vec![labelled_table("Results")]);
    let extractor = Extractor::new(Arc::new(doc.clone()), oracle).with_progress(recorder.clone());

    let _ = tokio_test::block_on(extractor.extract(&DocumentSource::Url(
        "https://example.com/t.pdf".into(),
    )));

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events.first().map(String::as_str), Some("done Analysis"));
    assert!(events.contains(&"done IdentityExtraction".to_string()));
    assert!(events.contains(&"done TableClassification".to_string()));
    assert_eq!(events.last().map(String::as_str), Some("rejected UnsupportedLayout"));
    assert!(!events.iter().any(|e| e.starts_with("complete")));
}

#[tokio::test]
async fn extractor_future_is_send() {
    let oracle = Arc::new(
        ScriptedOracle::default()
            .reply(OracleTask::Identity, identity())
            .reply(OracleTask::TableClassification, verdicts(&[true]))
            .reply(OracleTask::GradingScale, json!({"isMultipleGradingScale": false}))
            .reply(
                OracleTask::MarksExtraction,
                json!({"subjects": [{"subjectName": "Math", "subjectGrade": "A"}]}),
            ),
    );
    let doc = analysis(vec![labelled_table("Results")]);
    let extractor = Arc::new(Extractor::new(Arc::new(doc), oracle));

    let handle = tokio::spawn({
        let extractor = Arc::clone(&extractor);
        async move {
            extractor
                .extract(&DocumentSource::Bytes(b"%PDF".to_vec()))
                .await
        }
    });
    let result = handle.await.unwrap().unwrap();
    assert_eq!(result.marks.len(), 1);
}

#[tokio::test]
async fn saved_analysis_envelope_loads_and_reconstructs() {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    write!(
        tmp,
        "{}",
        json!({
            "status": "succeeded",
            "analyzeResult": {
                "content": "Jane Doe",
                "tables": [{
                    "rowCount": 3,
                    "columnCount": 2,
                    "cells": [
                        {"rowIndex": 0, "columnIndex": 0, "content": "Name", "columnSpan": 2}
                    ]
                }]
            }
        })
    )
    .unwrap();

    let doc = load_analysis(tmp.path()).await.unwrap();
    let tables = collect_tables(&doc);
    assert_eq!(tables.len(), 1);
    assert_eq!(
        tables[0].html(),
        [
            r#"<table border="1">"#,
            "<tr>",
            r#"<th colspan="2">Name</th>"#,
            "</tr>",
            "<tr>",
            "<th></th>",
            "<th></th>",
            "</tr>",
            "<tr>",
            "<td></td>",
            "<td></td>",
            "</tr>",
            "</table>",
        ]
        .join("\n")
    );
    assert_eq!(tables[0].header_texts(), vec!["Name".to_string()]);
}

#[test]
fn each_oracle_task_can_be_driven_directly() {
    let oracle = ScriptedOracle::default()
        .reply(OracleTask::TableClassification, verdicts(&[true, false]))
        .reply(OracleTask::GradingScale, json!({"isMultipleGradingScale": true}))
        .reply(
            OracleTask::MarksExtraction,
            json!({"subjects": [{"subjectName": "Art", "subjectGrade": "B+"}]}),
        );

    tokio_test::block_on(async {
        let classification: TableClassification =
            classify_as(&oracle, OracleTask::TableClassification, "tables")
                .await
                .unwrap();
        let flags: Vec<bool> = classification
            .tables
            .iter()
            .map(|v: &TableVerdict| v.is_marks_table)
            .collect();
        assert_eq!(flags, vec![true, false]);

        let scale: IsMultipleGradingScale = classify_as(&oracle, OracleTask::GradingScale, "t")
            .await
            .unwrap();
        assert!(scale.is_multiple_grading_scale);

        let extracted: ExtractedOutput = classify_as(&oracle, OracleTask::MarksExtraction, "t")
            .await
            .unwrap();
        assert_eq!(extracted.subjects, vec![ExtractedRecord::new("Art", "B+")]);
    });
}
